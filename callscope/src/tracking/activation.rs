use crate::domain::Address;

/// One modeled call frame
///
/// Created by the tracker when a call is observed and never modified
/// afterwards. Two activations are equal when they were taken at the same
/// stack pointer: call-site or target identity is unreliable under recursion,
/// the stack-pointer watermark is not.
#[derive(Debug, Clone, Copy)]
pub struct Activation {
    index: u64,
    stack_pointer: Address,
    target: Address,
}

impl Activation {
    #[must_use]
    pub fn new(index: u64, stack_pointer: Address, target: Address) -> Self {
        Self { index, stack_pointer, target }
    }

    /// Stable position index, unique among live activations of one tracker
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Stack pointer observed when the call was taken
    #[must_use]
    pub fn stack_pointer(&self) -> Address {
        self.stack_pointer
    }

    /// Address execution jumped to
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }
}

impl PartialEq for Activation {
    fn eq(&self, other: &Self) -> bool {
        self.stack_pointer == other.stack_pointer
    }
}

impl Eq for Activation {}
