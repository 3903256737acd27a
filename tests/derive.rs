use hostbind::prelude::*;
use hostbind::{BindingKind, HostCast};

#[derive(Clone, Debug, Default, PartialEq, NativeType)]
#[hostbind(clone)]
struct Account {
    #[hostbind(get, set, name = "owner_name")]
    owner: String,
    #[hostbind(get)]
    balance: i64,
    secret: u32,
}

#[derive(NativeType)]
struct Token(u32);

fn bind(rt: &mut HostRuntime) -> Handle {
    let m = rt.new_scope("bank");
    class_::<Account>(rt, m, "Account")
        .register()
        .unwrap()
        .def_init(|owner: String, balance: i64| Account {
            owner,
            balance,
            secret: 0,
        })
        .unwrap()
        .def_fields()
        .unwrap()
        .finish()
}

#[test]
fn capabilities_follow_attributes() {
    let caps = <Account as NativeType>::capabilities();
    assert!(caps.flags().contains(TypeFlags::COPY_CONSTRUCTIBLE | TypeFlags::HAS_COPY));
    assert!(caps.flags().contains(TypeFlags::HAS_DESTRUCT));

    let caps = <Token as NativeType>::capabilities();
    assert!(!caps.flags().contains(TypeFlags::COPY_CONSTRUCTIBLE));
    assert!(caps.destruct_hook().is_none());
    assert!(<<Token as HostCast>::Kind as BindingKind>::IS_BOUND);
}

#[test]
fn field_attributes_define_properties() {
    let mut rt = HostRuntime::new();
    let ty = bind(&mut rt);
    let a = rt
        .call(ty, &[Value::from("ada"), Value::Int(10)])
        .unwrap()
        .as_handle()
        .unwrap();

    assert_eq!(rt.get_attr(a, "owner_name"), Ok(Value::from("ada")));
    assert!(rt.get_attr(a, "owner").is_err());
    assert!(rt.get_attr(a, "secret").is_err());
    assert_eq!(rt.get_attr(a, "balance"), Ok(Value::Int(10)));

    rt.set_attr(a, "owner_name", &Value::from("grace")).unwrap();
    assert!(matches!(
        rt.set_attr(a, "balance", &Value::Int(0)),
        Err(HostError::ReadOnlyAttribute { .. })
    ));

    let mut cleanup = CleanupList::new();
    let copy = Account::from_host(&mut rt, &Value::Object(a), &mut cleanup).unwrap();
    assert_eq!(copy.owner, "grace");
    assert_eq!(copy.balance, 10);
}

#[test]
fn derived_assign_copies_through_clone() {
    let mut rt = HostRuntime::new();
    bind(&mut rt);
    let src = bound::cast_owned(
        &mut rt,
        Account {
            owner: "x".into(),
            balance: 1,
            secret: 9,
        },
    )
    .unwrap();
    let mut slot = Account::default();
    Account::assign_from_host(&mut slot, &mut rt, &Value::Object(src)).unwrap();
    assert_eq!(slot.secret, 9);
    assert_eq!(slot.owner, "x");
}
