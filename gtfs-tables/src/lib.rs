/*! Reads [GTFS](https://gtfs.org/) feeds into loosely typed tables.

Unlike a fully modelled GTFS library, this crate does not build one Rust struct per file.
A static feed is a zip archive of CSV files, and the files a producer ships vary a lot
(Metlink for instance adds `stop_patterns.txt`). Each file is therefore read as a [RawTable]
of string fields, and every field is then converted to the type its column is known to have.

## Reading a static feed

```
use gtfs_tables::{ArchiveReader, RawTable};
# let bytes: Vec<u8> = Vec::new();
let archive = ArchiveReader::default().extract(&bytes);
# assert!(archive.is_err());
```

[ArchiveReader::extract] yields `(table name, text)` pairs, [RawTable::parse] reads one of
them and [RawTable::into_typed] applies the column rules of [coercion].

## Design decisions

### Coercion never fails

A GTFS feed published by a transit agency is not always clean. A bad value in an integer
column makes that single field `null`; the row and the rest of the table are kept.
See [MalformedField].

### Realtime

The realtime vehicle positions are published as JSON whose naming and typing drift from the
static schema (numeric `route_id`, camelCase keys, enums as names or ordinals).
[realtime::FeedMessage] accepts all of them and always serializes the same shape.
*/
#![warn(missing_docs)]

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate serde_derive;

mod archive;
pub mod coercion;
mod enums;
pub mod error;
mod objects;
mod raw_table;
pub mod realtime;
mod serde_helpers;


pub use archive::{ArchiveEntry, ArchiveReader, ExtractedArchive};
pub use coercion::{coerce, column_type, ColumnType};
pub use enums::*;
pub use error::{Error, MalformedField};
pub use objects::*;
pub use raw_table::RawTable;
