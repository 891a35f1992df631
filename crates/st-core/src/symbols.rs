//! Interface types for the symbol and call-resolution collaborators.
//!
//! Array facts are recovered by scanning previously emitted declaration
//! lines, not from a separate symbol table, so the core only defines the
//! value types and the resolver seam.

/// Facts about a declared array: element width as log2 of the byte count
/// (byte = 0, hword = 1, word = 2, quad = 3, octa = 4) and element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayInfo {
    pub elem_size_log2: u32,
    pub len: usize,
}

impl ArrayInfo {
    /// Byte offset of element `index`.
    pub fn offset_of(&self, index: usize) -> usize {
        index << self.elem_size_log2
    }
}

/// Signature of an externally defined routine, as far as a calling
/// convention needs it.
#[derive(Debug, Clone)]
pub struct RoutineSignature {
    pub name: String,
    pub params: Vec<String>,
    pub defaults: Vec<Option<String>>,
    pub has_result: bool,
}

impl RoutineSignature {
    pub fn new(name: impl Into<String>, params: Vec<impl Into<String>>) -> Self {
        let params: Vec<String> = params.into_iter().map(Into::into).collect();
        let defaults = vec![None; params.len()];
        Self {
            name: name.into(),
            params,
            defaults,
            has_result: false,
        }
    }

    pub fn with_result(mut self) -> Self {
        self.has_result = true;
        self
    }
}

/// Resolves a callee name plus argument count to zero or one matching
/// routine. `None` makes the backend fall back to a conservative
/// save/restore call sequence.
pub trait CallResolver {
    fn resolve(&self, name: &str, argc: usize) -> Option<RoutineSignature>;
}

/// Resolver that knows no routines at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallResolver;

impl CallResolver for NoCallResolver {
    fn resolve(&self, _name: &str, _argc: usize) -> Option<RoutineSignature> {
        None
    }
}

impl CallResolver for Vec<RoutineSignature> {
    fn resolve(&self, name: &str, argc: usize) -> Option<RoutineSignature> {
        self.iter()
            .find(|sig| {
                sig.name == name
                    && argc <= sig.params.len()
                    && sig.params.len() - argc
                        <= sig.defaults.iter().filter(|d| d.is_some()).count()
            })
            .cloned()
    }
}
