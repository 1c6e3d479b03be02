/// Rank of a participant in a communicator group (0-indexed).
pub type Rank = u32;

/// Element count or displacement in per-rank metadata arrays.
pub type Count = u32;

/// Position of an algorithm in its operation's choice list.
pub type AlgorithmId = i32;

/// Id 0 of every operation: delegate to the native primitive.
pub const DEFAULT_ALGORITHM: AlgorithmId = 0;

/// Element types understood by the reduction kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    I8 = 2,
    I32 = 3,
    I64 = 4,
    U8 = 5,
    U32 = 6,
    U64 = 7,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
            DataType::I8 | DataType::U8 => 1,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, DataType::F32 | DataType::F64)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduction operations for collective communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Prod,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
    /// Element-wise bitwise or. Integer types only.
    BitOr,
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
            ReduceOp::BitOr => f.write_str("bor"),
        }
    }
}

/// The collectives whose implementation can be replaced.
///
/// Discriminants index per-operation tables (catalog modules, profile
/// slots, telemetry maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CollectiveOp {
    Allgather = 0,
    Allreduce = 1,
    Alltoall = 2,
    Bcast = 3,
    Gather = 4,
    Reduce = 5,
    ReduceScatterBlock = 6,
    Scan = 7,
    Scatter = 8,
}

impl CollectiveOp {
    pub const COUNT: usize = 9;

    pub const ALL: [CollectiveOp; Self::COUNT] = [
        CollectiveOp::Allgather,
        CollectiveOp::Allreduce,
        CollectiveOp::Alltoall,
        CollectiveOp::Bcast,
        CollectiveOp::Gather,
        CollectiveOp::Reduce,
        CollectiveOp::ReduceScatterBlock,
        CollectiveOp::Scan,
        CollectiveOp::Scatter,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name of the native primitive, as written in profile files and
    /// telemetry lines.
    pub const fn primitive_name(self) -> &'static str {
        match self {
            CollectiveOp::Allgather => "MPI_Allgather",
            CollectiveOp::Allreduce => "MPI_Allreduce",
            CollectiveOp::Alltoall => "MPI_Alltoall",
            CollectiveOp::Bcast => "MPI_Bcast",
            CollectiveOp::Gather => "MPI_Gather",
            CollectiveOp::Reduce => "MPI_Reduce",
            CollectiveOp::ReduceScatterBlock => "MPI_Reduce_scatter_block",
            CollectiveOp::Scan => "MPI_Scan",
            CollectiveOp::Scatter => "MPI_Scatter",
        }
    }

    /// Key used on the command line (`--module=<prefix>=...`).
    pub const fn cli_prefix(self) -> &'static str {
        match self {
            CollectiveOp::Allgather => "allgather",
            CollectiveOp::Allreduce => "allreduce",
            CollectiveOp::Alltoall => "alltoall",
            CollectiveOp::Bcast => "bcast",
            CollectiveOp::Gather => "gather",
            CollectiveOp::Reduce => "reduce",
            CollectiveOp::ReduceScatterBlock => "reduce_scatter_block",
            CollectiveOp::Scan => "scan",
            CollectiveOp::Scatter => "scatter",
        }
    }
}

impl std::fmt::Display for CollectiveOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.primitive_name())
    }
}
