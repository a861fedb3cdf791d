use std::fmt;

/// Transaction isolation level, including the read-only and deferrable variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    Serializable,
    RepeatableRead,
    ReadCommitted,
    SerializableReadOnly,
    RepeatableReadReadOnly,
    ReadCommittedReadOnly,
    SerializableReadOnlyDeferrable,
}

impl IsolationLevel {
    /// Every level, strongest read-write levels first.
    pub const ALL: [IsolationLevel; 7] = [
        IsolationLevel::Serializable,
        IsolationLevel::RepeatableRead,
        IsolationLevel::ReadCommitted,
        IsolationLevel::SerializableReadOnly,
        IsolationLevel::RepeatableReadReadOnly,
        IsolationLevel::ReadCommittedReadOnly,
        IsolationLevel::SerializableReadOnlyDeferrable,
    ];

    /// The transaction mode as written after `START TRANSACTION ISOLATION LEVEL`.
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::SerializableReadOnly => "SERIALIZABLE, READ ONLY",
            IsolationLevel::RepeatableReadReadOnly => "REPEATABLE READ, READ ONLY",
            IsolationLevel::ReadCommittedReadOnly => "READ COMMITTED, READ ONLY",
            IsolationLevel::SerializableReadOnlyDeferrable => "SERIALIZABLE, READ ONLY, DEFERRABLE",
        }
    }

    pub fn is_read_only(self) -> bool {
        !matches!(
            self,
            IsolationLevel::Serializable
                | IsolationLevel::RepeatableRead
                | IsolationLevel::ReadCommitted
        )
    }

    /// Whether work that asked for `requested` may run inside a transaction
    /// already open at `self`.
    ///
    /// Stronger read-write levels satisfy weaker ones, each read-write level
    /// satisfies its read-only counterpart, and the deferrable level is
    /// satisfied only by `Serializable`, `SerializableReadOnly` and itself.
    pub fn satisfies(self, requested: IsolationLevel) -> bool {
        use IsolationLevel::*;

        self == requested
            || match requested {
                Serializable => false,
                RepeatableRead => self.satisfies(Serializable),
                ReadCommitted => self.satisfies(RepeatableRead),
                SerializableReadOnly => self.satisfies(Serializable),
                RepeatableReadReadOnly => {
                    self.satisfies(SerializableReadOnly) || self.satisfies(RepeatableRead)
                }
                ReadCommittedReadOnly => {
                    self.satisfies(RepeatableReadReadOnly) || self.satisfies(ReadCommitted)
                }
                SerializableReadOnlyDeferrable => self.satisfies(SerializableReadOnly),
            }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}
