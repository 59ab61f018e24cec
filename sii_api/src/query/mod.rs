mod common;
pub use self::common::Query;

mod report;
pub use self::report::{AnnualReportQuery, MonthlyReportQuery, PdfQuery};
