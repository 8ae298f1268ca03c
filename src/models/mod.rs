//! Data models for Shelfkeeper

pub mod book;
pub mod loan;
pub mod report;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookDetails, BookFilter, BookInput};
pub use loan::{IssuedBook, Loan, LoanActivity, LoanDetails, LoanStatus, OverdueLoan};
pub use report::LibrarySummary;
pub use user::{Role, User, UserDetails};
