use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

// Shared lets tasks mutably share testbench objects (statistics, recorded
// traces, ...). The simulation is single threaded, so Rc + RefCell is enough.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(data: T) -> Shared<T> {
        Shared(Rc::new(RefCell::new(data)))
    }
    pub fn get(&self) -> Ref<T> {
        (*self.0).borrow()
    }
    pub fn get_mut(&self) -> RefMut<T> {
        (*self.0).borrow_mut()
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get_mut())
    }
}

impl<T: Clone> Shared<T> {
    pub fn snapshot(&self) -> T {
        self.get().clone()
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(self.0.clone())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Shared").field(&*self.get()).finish()
    }
}
