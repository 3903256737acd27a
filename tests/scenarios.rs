use std::sync::atomic::{AtomicUsize, Ordering};

use hostbind::prelude::*;
use hostbind::{EnumSupplement, NativeTypeId};
use num_enum::{IntoPrimitive, TryFromPrimitive};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, NativeType)]
#[hostbind(copy)]
struct Point {
    #[hostbind(get, set)]
    x: i32,
    y: i32,
}

fn bytes_of<T>(value: &T) -> &[u8] {
    // SAFETY: any initialized value can be viewed as bytes for comparison;
    // `Point` has no padding.
    unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), size_of::<T>()) }
}

#[test]
fn point_round_trip() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("geometry");
    let ty = class_::<Point>(&mut rt, m, "Point")
        .register()
        .unwrap()
        .def_init(|x: i32, y: i32| Point { x, y })
        .unwrap()
        .def_fields()
        .unwrap()
        .finish();

    assert_eq!(rt.type_size(ty), Ok(size_of::<Point>()));
    assert_eq!(rt.type_align(ty), Ok(align_of::<Point>()));
    let descriptor = rt.type_descriptor(ty).unwrap();
    assert!(descriptor.copy.is_none());
    assert!(descriptor.move_fn.is_none());
    assert!(descriptor.destruct.is_none());

    let p = rt
        .call(ty, &[Value::Int(3), Value::Int(4)])
        .unwrap()
        .as_handle()
        .unwrap();
    assert_eq!(rt.get_attr(p, "x"), Ok(Value::Int(3)));
    rt.set_attr(p, "x", &Value::Int(5)).unwrap();
    assert_eq!(rt.get_attr(p, "x"), Ok(Value::Int(5)));

    let expected = Point { x: 5, y: 4 };
    let payload = rt.inst_ptr(p).unwrap();
    // SAFETY: the payload spans `size_of::<Point>()` bytes.
    let actual = unsafe { std::slice::from_raw_parts(payload.as_ptr(), size_of::<Point>()) };
    assert_eq!(actual, bytes_of(&expected));

    rt.decref(p);
    assert_eq!(rt.live_instances(), 0);
}

static BASE_COPIES: AtomicUsize = AtomicUsize::new(0);
static DERIVED_COPIES: AtomicUsize = AtomicUsize::new(0);

#[repr(C)]
#[derive(Debug, NativeType)]
#[hostbind(clone)]
struct Base {
    #[hostbind(get)]
    id: u32,
}

impl Clone for Base {
    fn clone(&self) -> Self {
        BASE_COPIES.fetch_add(1, Ordering::SeqCst);
        Base { id: self.id }
    }
}

#[repr(C)]
#[derive(Debug, NativeType)]
#[hostbind(clone)]
struct Derived {
    base: Base,
    #[hostbind(get, set)]
    label: String,
}

impl Clone for Derived {
    fn clone(&self) -> Self {
        DERIVED_COPIES.fetch_add(1, Ordering::SeqCst);
        Derived {
            base: Base { id: self.base.id },
            label: self.label.clone(),
        }
    }
}

// SAFETY: repr(C) with a `Base` first.
unsafe impl Upcast<Base> for Derived {}

#[test]
fn derived_copies_use_their_own_hook() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("m");
    let base_ty = class_::<Base>(&mut rt, m, "Base")
        .register()
        .unwrap()
        .def_init(|id: u32| Base { id })
        .unwrap()
        .def_fields()
        .unwrap()
        .def("ident", |b: &Base| b.id)
        .unwrap()
        .finish();
    let derived_ty = class_::<Derived>(&mut rt, m, "Derived")
        .base::<Base>()
        .register()
        .unwrap()
        .def_init(|id: u32, label: String| Derived {
            base: Base { id },
            label,
        })
        .unwrap()
        .def_fields()
        .unwrap()
        .finish();

    assert_eq!(rt.type_base(derived_ty), Ok(Some(base_ty)));
    assert_eq!(rt.type_info(base_ty), Ok(NativeTypeId::of::<Base>()));
    assert!(rt.type_flags(derived_ty).unwrap().contains(TypeFlags::HAS_DESTRUCT));
    assert!(!rt.type_flags(base_ty).unwrap().contains(TypeFlags::HAS_DESTRUCT));

    let src = rt
        .call(derived_ty, &[Value::Int(7), Value::from("seven")])
        .unwrap()
        .as_handle()
        .unwrap();
    let dst = rt.inst_alloc(derived_ty).unwrap();
    let (base_before, derived_before) = (
        BASE_COPIES.load(Ordering::SeqCst),
        DERIVED_COPIES.load(Ordering::SeqCst),
    );
    rt.inst_copy(dst, src).unwrap();
    assert_eq!(DERIVED_COPIES.load(Ordering::SeqCst), derived_before + 1);
    assert_eq!(BASE_COPIES.load(Ordering::SeqCst), base_before);

    assert_eq!(rt.inst_state(dst), Ok((true, true)));
    assert_eq!(rt.get_attr(dst, "label"), Ok(Value::from("seven")));
    assert_eq!(rt.get_attr(dst, "id"), Ok(Value::Int(7)));
    assert_eq!(rt.call_method(dst, "ident", &[]), Ok(Value::Int(7)));

    rt.decref(src);
    rt.decref(dst);
    assert_eq!(rt.live_instances(), 0);
}

static EXTRA_DROPS: AtomicUsize = AtomicUsize::new(0);
static ALIAS_COPIES: AtomicUsize = AtomicUsize::new(0);

#[repr(C)]
#[derive(Clone, Copy, Debug, NativeType)]
#[hostbind(copy)]
struct Widget {
    size: i64,
}

/// State that only host subclasses carry.
#[derive(Debug)]
struct Extra;

impl Drop for Extra {
    fn drop(&mut self) {
        EXTRA_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

#[repr(C)]
#[derive(Debug, NativeType)]
#[hostbind(clone)]
struct WidgetAlias {
    base: Widget,
    extra: Extra,
}

impl Clone for WidgetAlias {
    fn clone(&self) -> Self {
        ALIAS_COPIES.fetch_add(1, Ordering::SeqCst);
        WidgetAlias {
            base: self.base,
            extra: Extra,
        }
    }
}

// SAFETY: repr(C) with a `Widget` first.
unsafe impl Upcast<Widget> for WidgetAlias {}

#[test]
fn host_subclasses_build_and_drop_the_alias() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("m");
    let ty = class_::<Widget>(&mut rt, m, "Widget")
        .alias::<WidgetAlias>()
        .register()
        .unwrap()
        .def_init_with_alias(
            |size: i64| Widget { size },
            |size: i64| WidgetAlias {
                base: Widget { size },
                extra: Extra,
            },
        )
        .unwrap()
        .def("size", |w: &Widget| w.size)
        .unwrap()
        .finish();
    assert_eq!(rt.type_size(ty), Ok(size_of::<WidgetAlias>()));
    let sub = rt.create_subclass(m, "PyWidget", ty).unwrap();

    let plain = rt.call(ty, &[Value::Int(1)]).unwrap().as_handle().unwrap();
    let derived = rt.call(sub, &[Value::Int(2)]).unwrap().as_handle().unwrap();
    assert_eq!(rt.inst_holds_alias(plain), Ok(false));
    assert_eq!(rt.inst_holds_alias(derived), Ok(true));
    assert_eq!(rt.call_method(derived, "size", &[]), Ok(Value::Int(2)));

    let copy = rt.inst_alloc(sub).unwrap();
    let copies_before = ALIAS_COPIES.load(Ordering::SeqCst);
    rt.inst_copy(copy, derived).unwrap();
    assert_eq!(ALIAS_COPIES.load(Ordering::SeqCst), copies_before + 1);
    assert_eq!(rt.inst_holds_alias(copy), Ok(true));
    assert_eq!(rt.call_method(copy, "size", &[]), Ok(Value::Int(2)));

    let drops_before = EXTRA_DROPS.load(Ordering::SeqCst);
    rt.decref(plain);
    assert_eq!(EXTRA_DROPS.load(Ordering::SeqCst), drops_before);
    rt.decref(derived);
    rt.decref(copy);
    assert_eq!(EXTRA_DROPS.load(Ordering::SeqCst), drops_before + 2);
    assert_eq!(rt.live_instances(), 0);
}

#[derive(Clone, Copy, Debug, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum Color {
    Red = 0,
    Green = 1,
    Blue = 2,
}

#[test]
fn color_entries_are_exported_in_order() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("paint");
    let ty = enum_::<Color>(&mut rt, m, "Color")
        .register()
        .unwrap()
        .value("RED", Color::Red, None)
        .unwrap()
        .value("GREEN", Color::Green, None)
        .unwrap()
        .value("BLUE", Color::Blue, None)
        .unwrap()
        .export_values()
        .unwrap()
        .finish();

    for name in ["RED", "GREEN", "BLUE"] {
        assert!(rt.has_attr(m, name), "{name} not exported");
    }
    let entries = &rt.type_supplement::<EnumSupplement>(ty).unwrap().entries;
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["RED", "GREEN", "BLUE"]);
    let values: Vec<i64> = entries.iter().map(|e| e.value).collect();
    assert_eq!(values, [0, 1, 2]);

    let green = rt.get_attr(m, "GREEN").unwrap().as_handle().unwrap();
    assert_eq!(rt.enum_value(green), Ok(1));
    assert_eq!(rt.call(ty, &[Value::Int(1)]), Ok(Value::Object(green)));
    assert_eq!(rt.call_method(green, "__repr__", &[]), Ok(Value::from("Color.GREEN")));
    assert!(rt.call(ty, &[Value::Int(9)]).is_err());
}
