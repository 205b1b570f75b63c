use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use tracing::warn;

type Target<P> = Box<dyn FnMut(P)>;
type TargetMut<P> = Box<dyn FnMut(&mut P)>;

fn with_owner<T>(owner: &Weak<RefCell<T>>, method: impl FnOnce(&mut T)) {
    let Some(owner) = owner.upgrade() else {
        return;
    };
    match owner.try_borrow_mut() {
        Ok(mut target) => method(&mut *target),
        Err(_) => warn!(
            owner = std::any::type_name::<T>(),
            "skipping re-entrant callback dispatch"
        ),
    };
}

#[derive(Default)]
pub struct Handler {
    inner: HandlerParam<()>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, owner: &Rc<RefCell<T>>, method: fn(&mut T)) {
        let owner = Rc::downgrade(owner);
        self.inner
            .register_fn(move |()| with_owner(&owner, |target| method(target)));
    }

    pub fn register_fn(&mut self, mut callback: impl FnMut() + 'static) {
        self.inner.register_fn(move |()| callback());
    }

    pub fn unregister(&mut self) {
        self.inner.unregister();
    }

    pub fn has_handler(&self) -> bool {
        self.inner.has_handler()
    }

    pub fn invoke(&mut self) {
        self.inner.invoke(());
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("bound", &self.has_handler())
            .finish()
    }
}

pub struct HandlerParam<P> {
    target: Option<Target<P>>,
}

impl<P> Default for HandlerParam<P> {
    fn default() -> Self {
        Self { target: None }
    }
}

impl<P: 'static> HandlerParam<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, owner: &Rc<RefCell<T>>, method: fn(&mut T, P)) {
        let owner = Rc::downgrade(owner);
        self.register_fn(move |param| with_owner(&owner, |target| method(target, param)));
    }

    pub fn register_fn(&mut self, callback: impl FnMut(P) + 'static) {
        self.unregister();
        self.target = Some(Box::new(callback));
    }

    pub fn unregister(&mut self) {
        self.target = None;
    }

    pub fn has_handler(&self) -> bool {
        self.target.is_some()
    }

    pub fn invoke(&mut self, param: P) {
        if let Some(target) = self.target.as_mut() {
            target(param);
        }
    }
}

impl<P> fmt::Debug for HandlerParam<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerParam")
            .field("bound", &self.target.is_some())
            .finish()
    }
}

pub struct HandlerMut<P> {
    target: Option<TargetMut<P>>,
}

impl<P> Default for HandlerMut<P> {
    fn default() -> Self {
        Self { target: None }
    }
}

impl<P: 'static> HandlerMut<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, owner: &Rc<RefCell<T>>, method: fn(&mut T, &mut P)) {
        let owner = Rc::downgrade(owner);
        self.register_fn(move |param: &mut P| {
            with_owner(&owner, |target| method(target, param));
        });
    }

    pub fn register_fn(&mut self, callback: impl FnMut(&mut P) + 'static) {
        self.unregister();
        self.target = Some(Box::new(callback));
    }

    pub fn unregister(&mut self) {
        self.target = None;
    }

    pub fn has_handler(&self) -> bool {
        self.target.is_some()
    }

    pub fn invoke(&mut self, param: &mut P) {
        if let Some(target) = self.target.as_mut() {
            target(param);
        }
    }
}

impl<P> fmt::Debug for HandlerMut<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMut")
            .field("bound", &self.target.is_some())
            .finish()
    }
}
