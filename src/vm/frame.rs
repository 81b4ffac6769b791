use std::rc::Rc;

use crate::code::Instructions;
use crate::object::Closure;

/// One call's worth of execution state: the closure being run, an
/// instruction pointer private to this call, and where its locals begin on
/// the shared value stack.
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: isize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: -1,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}
