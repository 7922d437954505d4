//! # craft_tags
//!
//! Command tag grammar for sitecraft.
//!
//! The assistant embeds bracketed command tags inside free-form chat text.
//! This crate finds them and turns them into typed values. It does no I/O and
//! keeps no state.
//!
//! ## Tag Forms
//!
//! | Tag | Form |
//! |-----|------|
//! | Sitemap | `[SITEMAP: Home, About Us, Contact]` |
//! | Metadata | `[METADATA: title=My Site, lang=en]` |
//! | Styles | `[STYLES: primaryColor=#1d4ed8]` |
//! | Preview | `[PREVIEW: hero] ...html... [/PREVIEW]` |
//! | Clear preview | `[CLEAR_PREVIEW]` |
//! | Final site | `[GENERATE_INDEX] ...html... [/GENERATE_INDEX]` |
//! | Approved sections | `[GET_APPROVED_SECTIONS]` |
//!
//! ## Example
//!
//! ```rust
//! use craft_tags::{detect, strip_tags};
//!
//! let reply = "Done!\n[SITEMAP: Home, About Us]\n[METADATA: title=Bakery]";
//! let tags = detect(reply);
//!
//! assert_eq!(tags.sitemap.unwrap(), vec!["Home", "About Us"]);
//! assert_eq!(tags.metadata.unwrap()["title"], "Bakery");
//! assert_eq!(strip_tags(reply), "Done!");
//! ```

pub mod command;
pub mod error;
pub mod grammar;
pub mod kv;

pub use command::{Command, DetectedTags, Entries, PreviewTag, TagKind};
pub use error::{TagParseError, TagResult};
pub use grammar::{detect, has_tags, strip_tags, tag_kinds};
pub use kv::{parse_list, parse_pairs};
