//! Domain models for property-ledger-service.

mod budget;
mod category;
mod entry;
mod property;

pub use budget::{Budget, BudgetItem, BudgetRow, Group};
pub use category::{Category, CategoryMatch, NewCategory, Reference};
pub use entry::{ConfirmedEntry, CreatedEntry, Entry, NewEntry, CONFIRMED_SITUATION_ID, UNCATEGORIZED_CATEGORY_ID};
pub use property::{NewProperty, Property, PropertyMatch, PropertySummary};
