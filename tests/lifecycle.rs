use std::cell::Cell;
use std::ptr;
use std::rc::Rc;
use std::sync::{Arc, Weak};

use hostbind::prelude::*;
use hostbind::{KeepAlive, SharedFromThis, WeakReferenceable};

#[derive(NativeType)]
struct Tracked {
    drops: Rc<Cell<usize>>,
    tag: u32,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, NativeType)]
#[hostbind(copy)]
struct Pixel {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

fn setup() -> (HostRuntime, Handle, Handle) {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("m");
    let tracked = class_::<Tracked>(&mut rt, m, "Tracked").register().unwrap().finish();
    let pixel = class_::<Pixel>(&mut rt, m, "Pixel").register().unwrap().finish();
    (rt, tracked, pixel)
}

fn tracked(rt: &mut HostRuntime, drops: &Rc<Cell<usize>>, tag: u32) -> Handle {
    bound::cast_owned(
        rt,
        Tracked {
            drops: Rc::clone(drops),
            tag,
        },
    )
    .unwrap()
}

fn payload_bytes(rt: &HostRuntime, inst: Handle, len: usize) -> Vec<u8> {
    let ptr = rt.inst_ptr(inst).unwrap();
    // SAFETY: the payload spans at least `len` bytes.
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) }.to_vec()
}

#[test]
fn alloc_ready_and_destroyed_states() {
    let (mut rt, ty, _) = setup();
    let drops = Rc::new(Cell::new(0));

    let inst = rt.inst_alloc(ty).unwrap();
    assert_eq!(rt.inst_state(inst), Ok((false, true)));
    let slot = rt.inst_uninit_ptr::<Tracked>(inst).unwrap();
    // SAFETY: freshly allocated storage for a `Tracked`.
    unsafe {
        slot.write(Tracked {
            drops: Rc::clone(&drops),
            tag: 1,
        })
    };
    rt.inst_mark_ready(inst).unwrap();
    assert_eq!(rt.inst_state(inst), Ok((true, true)));

    // SAFETY: the payload is ready; it is destroyed exactly once, here.
    unsafe { ptr::drop_in_place(rt.inst_cast_ptr::<Tracked>(inst).unwrap().as_ptr()) };
    rt.inst_set_destroyed(inst).unwrap();
    assert_eq!(rt.inst_state(inst), Ok((false, false)));
    rt.decref(inst);
    assert_eq!(drops.get(), 1);
}

#[test]
fn explicit_destruct_runs_once() {
    let (mut rt, ty, _) = setup();
    let drops = Rc::new(Cell::new(0));
    let inst = tracked(&mut rt, &drops, 1);
    assert_eq!(rt.inst_type(inst), Ok(ty));
    rt.inst_destruct(inst).unwrap();
    rt.inst_destruct(inst).unwrap();
    assert_eq!(rt.inst_ready(inst), Ok(false));
    rt.decref(inst);
    assert_eq!(drops.get(), 1);
}

#[test]
fn references_never_destruct() {
    let (mut rt, ty, _) = setup();
    let drops = Rc::new(Cell::new(0));
    let parent = tracked(&mut rt, &drops, 42);

    let payload = rt.inst_ptr(parent).unwrap();
    // SAFETY: the payload is owned by `parent`, which the child keeps alive.
    let child = unsafe { rt.inst_reference(ty, payload, Some(parent)).unwrap() };
    assert_eq!(rt.inst_state(child), Ok((true, false)));

    rt.decref(parent);
    assert!(rt.is_alive(parent));
    // SAFETY: `parent` is still alive, so the payload is valid.
    assert_eq!(unsafe { rt.inst_cast_ptr::<Tracked>(child).unwrap().as_ref() }.tag, 42);
    assert_eq!(drops.get(), 0);

    rt.decref(child);
    assert_eq!(drops.get(), 1);
    assert!(!rt.is_alive(parent));

    let outside = Tracked {
        drops: Rc::clone(&drops),
        tag: 7,
    };
    // SAFETY: `outside` outlives the instance.
    let view = unsafe { rt.inst_reference(ty, ptr::NonNull::from(&outside).cast(), None).unwrap() };
    rt.decref(view);
    assert_eq!(drops.get(), 1);
    drop(outside);
    assert_eq!(drops.get(), 2);
}

#[test]
fn trivial_copy_and_move_are_byte_exact() {
    let (mut rt, _, ty) = setup();
    let descriptor = rt.type_descriptor(ty).unwrap();
    assert!(descriptor.copy.is_none() && descriptor.move_fn.is_none() && descriptor.destruct.is_none());
    assert!(!rt.type_flags(ty).unwrap().intersects(TypeFlags::HAS_COPY | TypeFlags::HAS_MOVE | TypeFlags::HAS_DESTRUCT));

    let src = bound::cast_owned(&mut rt, Pixel { r: 1, g: 2, b: 3, a: 4 }).unwrap();
    let copy = rt.inst_alloc(ty).unwrap();
    rt.inst_copy(copy, src).unwrap();
    assert_eq!(rt.inst_state(copy), Ok((true, true)));
    assert_eq!(payload_bytes(&rt, copy, size_of::<Pixel>()), payload_bytes(&rt, src, size_of::<Pixel>()));

    let moved = rt.inst_alloc(ty).unwrap();
    rt.inst_move(moved, src).unwrap();
    assert_eq!(rt.inst_ready(src), Ok(false));
    assert_eq!(payload_bytes(&rt, moved, size_of::<Pixel>()), vec![1, 2, 3, 4]);

    let err = rt.inst_copy(copy, src).unwrap_err();
    assert!(matches!(err, HostError::Conversion(_)));
}

#[test]
fn replace_is_a_no_op_on_self() {
    let (mut rt, _, ty) = setup();
    let p = bound::cast_owned(&mut rt, Pixel { r: 9, g: 9, b: 9, a: 9 }).unwrap();
    rt.inst_replace_copy(p, p).unwrap();
    rt.inst_replace_move(p, p).unwrap();
    assert_eq!(rt.inst_state(p), Ok((true, true)));

    let q = bound::cast_owned(&mut rt, Pixel { r: 0, g: 0, b: 0, a: 1 }).unwrap();
    rt.inst_replace_copy(p, q).unwrap();
    assert_eq!(payload_bytes(&rt, p, 4), vec![0, 0, 0, 1]);
    assert_eq!(rt.inst_type(p), Ok(ty));
}

#[test]
fn transfers_check_types_and_capabilities() {
    let (mut rt, tracked_ty, pixel_ty) = setup();
    let drops = Rc::new(Cell::new(0));
    let t = tracked(&mut rt, &drops, 1);
    let p = bound::cast_owned(&mut rt, Pixel { r: 0, g: 0, b: 0, a: 0 }).unwrap();

    let dst = rt.inst_alloc(pixel_ty).unwrap();
    assert!(matches!(rt.inst_copy(dst, t), Err(HostError::TypeMismatch { .. })));
    assert_eq!(rt.inst_state(dst), Ok((false, true)));

    let dst = rt.inst_alloc(tracked_ty).unwrap();
    assert!(matches!(
        rt.inst_copy(dst, t),
        Err(HostError::MissingCapability { .. })
    ));
    rt.inst_move(dst, t).unwrap();
    assert_eq!(rt.inst_ready(t), Ok(false));

    rt.decref(t);
    assert_eq!(drops.get(), 0);
    rt.decref(dst);
    assert_eq!(drops.get(), 1);
    rt.decref(p);
}

#[test]
fn zeroed_and_adopted_instances() {
    let (mut rt, tracked_ty, pixel_ty) = setup();
    let z = rt.inst_alloc_zero(pixel_ty).unwrap();
    assert_eq!(rt.inst_state(z), Ok((false, true)));
    assert_eq!(payload_bytes(&rt, z, 4), vec![0; 4]);

    let p = bound::cast_owned(&mut rt, Pixel { r: 5, g: 5, b: 5, a: 5 }).unwrap();
    rt.inst_zero(p).unwrap();
    assert_eq!(rt.inst_state(p), Ok((true, true)));
    assert_eq!(payload_bytes(&rt, p, 4), vec![0; 4]);

    let drops = Rc::new(Cell::new(0));
    let boxed = Box::new(Tracked {
        drops: Rc::clone(&drops),
        tag: 3,
    });
    let adopted = rt.inst_take_ownership_boxed(tracked_ty, boxed).unwrap();
    assert_eq!(rt.inst_state(adopted), Ok((true, true)));
    rt.decref(adopted);
    assert_eq!(drops.get(), 1);

    let wrong = rt.inst_take_ownership_boxed(pixel_ty, Box::new(7u32));
    assert!(wrong.is_err());
}

#[test]
fn facade_rejects_foreign_handles() {
    let (mut rt, ty, _) = setup();
    let scope = rt.new_scope("other");
    assert!(!rt.type_check(scope));
    assert!(rt.type_check(ty));
    assert!(matches!(rt.inst_alloc(scope), Err(HostError::NotAType { .. })));
    assert!(matches!(rt.inst_state(ty), Err(HostError::NotAnInstance { .. })));
    assert!(!rt.inst_check(ty));
}

#[test]
fn teardown_may_reenter_the_runtime() {
    let (mut rt, _, _) = setup();
    let drops = Rc::new(Cell::new(0));
    let first = tracked(&mut rt, &drops, 1);
    let second = tracked(&mut rt, &drops, 2);
    let third = tracked(&mut rt, &drops, 3);

    rt.keep_alive(
        first,
        KeepAlive::Callback(Box::new(move |rt: &mut HostRuntime| {
            rt.decref(second);
            assert!(!rt.is_alive(second));
        })),
    )
    .unwrap();
    rt.keep_alive(third, KeepAlive::Object(first)).unwrap();
    rt.decref(first);
    assert!(rt.is_alive(first));

    rt.decref(third);
    assert_eq!(drops.get(), 3);
    assert_eq!(rt.live_instances(), 0);
}

#[test]
fn shutdown_destructs_leaked_instances() {
    let drops = Rc::new(Cell::new(0));
    {
        let (mut rt, _, _) = setup();
        tracked(&mut rt, &drops, 1);
    }
    assert_eq!(drops.get(), 1);

    let mut rt = HostRuntime::with_config(RuntimeConfig::default().strict_teardown(false).leak_warnings(false));
    let m = rt.new_scope("m");
    class_::<Tracked>(&mut rt, m, "Tracked").register().unwrap();
    tracked(&mut rt, &drops, 2);
    drop(rt);
    assert_eq!(drops.get(), 1);
}

#[derive(NativeType)]
#[hostbind(shared)]
struct Node {
    me: Weak<Node>,
    value: i32,
}

impl SharedFromThis for Node {
    fn weak_from_this(&self) -> Weak<Self> {
        self.me.clone()
    }
}

#[test]
fn shared_values_keep_their_owner_alive() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("m");
    let ty = class_::<Node>(&mut rt, m, "Node")
        .register()
        .unwrap()
        .def("value", |n: &Node| n.value)
        .unwrap()
        .finish();
    assert!(rt.type_flags(ty).unwrap().contains(TypeFlags::SHARED_FROM_THIS));

    let node = Arc::new_cyclic(|me| Node {
        me: me.clone(),
        value: 11,
    });
    let h = bound::cast_shared(&mut rt, Arc::clone(&node)).unwrap();
    assert_eq!(Arc::strong_count(&node), 2);
    assert_eq!(rt.inst_state(h), Ok((true, false)));
    assert_eq!(rt.call_method(h, "value", &[]), Ok(Value::Int(11)));

    rt.decref(h);
    assert_eq!(Arc::strong_count(&node), 1);
}

#[test]
fn shared_values_without_an_owner_fall_back_to_holding_the_arc() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("m");
    class_::<Node>(&mut rt, m, "Node").register().unwrap();

    // Never placed behind `Arc::new_cyclic`, so the weak slot cannot upgrade.
    let node = Arc::new(Node {
        me: Weak::new(),
        value: 4,
    });
    let h = bound::cast_shared(&mut rt, Arc::clone(&node)).unwrap();
    assert_eq!(rt.keep_shared_alive(h), Ok(false));
    assert_eq!(Arc::strong_count(&node), 2);

    rt.decref(h);
    assert_eq!(Arc::strong_count(&node), 1);
}

#[test]
fn keep_shared_alive_needs_the_hook() {
    let (mut rt, _, _) = setup();
    let drops = Rc::new(Cell::new(0));
    let h = tracked(&mut rt, &drops, 1);
    assert!(matches!(
        rt.keep_shared_alive(h),
        Err(HostError::MissingCapability {
            capability: "shared-from-this",
            ..
        })
    ));
}

#[derive(NativeType)]
struct Observed {
    weak_slot: Option<Handle>,
}

impl WeakReferenceable for Observed {
    fn set_weak_handle(&mut self, handle: Handle) {
        self.weak_slot = Some(handle);
    }
}

fn weak_slot(rt: &HostRuntime, inst: Handle) -> Option<Handle> {
    // SAFETY: the instance is ready and holds an `Observed`.
    unsafe { rt.inst_cast_ptr::<Observed>(inst).unwrap().as_ref() }.weak_slot
}

#[test]
fn weak_referenceable_values_learn_their_handle() {
    let mut rt = HostRuntime::new();
    let m = rt.new_scope("m");
    let ty = class_::<Observed>(&mut rt, m, "Observed")
        .extra(TypeTrait::weak_ref::<Observed>())
        .register()
        .unwrap()
        .def_init(|| Observed { weak_slot: None })
        .unwrap()
        .finish();
    assert!(rt.type_flags(ty).unwrap().contains(TypeFlags::WEAK_REFERENCEABLE));

    let Ok(Value::Object(constructed)) = rt.call(ty, &[]) else {
        panic!("constructor did not return an instance");
    };
    assert_eq!(weak_slot(&rt, constructed), Some(constructed));

    let wrapped = bound::cast_owned(&mut rt, Observed { weak_slot: None }).unwrap();
    assert_eq!(weak_slot(&rt, wrapped), Some(wrapped));
}
