use super::{AlgorithmChoice, lookup_algorithm_id_by_name, validate_algorithm_id};
use crate::error::Result;
use crate::types::{AlgorithmId, CollectiveOp, DEFAULT_ALGORITHM};
use tracing::warn;

/// Static description of one replaceable operation.
pub trait CollectiveModule: Send + Sync {
    fn op(&self) -> CollectiveOp;

    fn cli_prefix(&self) -> &'static str {
        self.op().cli_prefix()
    }

    fn primitive_name(&self) -> &'static str {
        self.op().primitive_name()
    }

    fn is_rooted(&self) -> bool;

    /// Ordered choices; index 0 is always `default`.
    fn choices(&self) -> &'static [AlgorithmChoice];

    /// Turn a parameter string (`alg:<name>[,key:value...]` or a bare
    /// algorithm name) into an algorithm id. Anything unresolvable is logged
    /// and mapped to the default.
    fn parse(&self, params: &str) -> AlgorithmId {
        let Some(name) = algorithm_param(params) else {
            warn!(
                module = self.cli_prefix(),
                params, "no algorithm named in module parameters, using default"
            );
            return DEFAULT_ALGORITHM;
        };
        match lookup_algorithm_id_by_name(self.choices(), name) {
            Ok(id) => id,
            Err(e) => {
                warn!(module = self.cli_prefix(), "{e}, using default");
                DEFAULT_ALGORITHM
            }
        }
    }
}

/// Extract the algorithm name from a module parameter string.
fn algorithm_param(params: &str) -> Option<&str> {
    let mut bare = None;
    for item in params.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.split_once(':') {
            Some(("alg", name)) => return Some(name.trim()),
            Some(_) => {}
            None if bare.is_none() => bare = Some(item),
            None => {}
        }
    }
    bare
}

/// Registry-owned handle for one operation: its descriptor plus the
/// algorithm currently selected for it.
pub struct Module {
    descriptor: Box<dyn CollectiveModule>,
    active: AlgorithmId,
}

impl Module {
    pub fn new(descriptor: Box<dyn CollectiveModule>) -> Self {
        Self {
            descriptor,
            active: DEFAULT_ALGORITHM,
        }
    }

    pub fn op(&self) -> CollectiveOp {
        self.descriptor.op()
    }

    pub fn cli_prefix(&self) -> &'static str {
        self.descriptor.cli_prefix()
    }

    pub fn primitive_name(&self) -> &'static str {
        self.descriptor.primitive_name()
    }

    pub fn is_rooted(&self) -> bool {
        self.descriptor.is_rooted()
    }

    pub fn choices(&self) -> &'static [AlgorithmChoice] {
        self.descriptor.choices()
    }

    pub fn parse(&self, params: &str) -> AlgorithmId {
        self.descriptor.parse(params)
    }

    pub fn active(&self) -> AlgorithmId {
        self.active
    }

    /// Select the algorithm used when no per-call choice is made. Invalid
    /// ids are rejected and leave the selection unchanged.
    pub fn set_active(&mut self, id: AlgorithmId) -> Result<()> {
        validate_algorithm_id(self.choices(), id)?;
        self.active = id;
        Ok(())
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("op", &self.op())
            .field("active", &self.active)
            .finish()
    }
}

/// Declare an operation's algorithm enum and its [`CollectiveModule`].
///
/// Ids must be dense and start with `Default = 0`.
macro_rules! collective_module {
    (
        $(#[$meta:meta])*
        $module:ident => $alg:ident {
            op: $op:expr,
            rooted: $rooted:literal,
            $($variant:ident = $id:literal => $name:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $alg {
            $($variant),+
        }

        impl $alg {
            pub const CHOICES: &'static [$crate::catalog::AlgorithmChoice] = &[
                $($crate::catalog::AlgorithmChoice { id: $id, name: $name }),+
            ];

            pub fn from_id(id: $crate::types::AlgorithmId) -> Option<Self> {
                match id {
                    $($id => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub const fn id(self) -> $crate::types::AlgorithmId {
                match self {
                    $(Self::$variant => $id),+
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        #[derive(Debug, Clone, Copy, Default)]
        pub struct $module;

        impl $crate::catalog::CollectiveModule for $module {
            fn op(&self) -> $crate::types::CollectiveOp {
                $op
            }

            fn is_rooted(&self) -> bool {
                $rooted
            }

            fn choices(&self) -> &'static [$crate::catalog::AlgorithmChoice] {
                $alg::CHOICES
            }
        }
    };
}

pub(crate) use collective_module;
