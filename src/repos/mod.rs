mod memory;
mod transactions;

pub use memory::InMemoryTransactionStore;
pub use transactions::{
    fold_groups, DynTransactionStore, GroupKey, GroupSum, SumField, TransactionStore,
};
