//! Output generation: the article page and the index feed.
//!
//! # Submodules
//!
//! - [`article`]: Renders the article template and picks its file name
//! - [`feed`]: Builds the feed card and splices it into the index page
//!
//! # Output Structure
//!
//! ```text
//! site_root/
//! ├── index.html                          # Feed, newest card first
//! ├── articles/
//! │   ├── 2026-10-18-budget-2027.html
//! │   └── 2026-10-18-budget-2027-2.html   # Second run, same title
//! └── images/
//!     └── 2026-10-18-budget-2027-hero.jpg
//! ```

pub mod article;
pub mod feed;
