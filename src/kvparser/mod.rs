//! Schema-driven decoding of "key value" pseudofiles.
//!
//! Most of the human-readable tables the kernel exports under `/proc` and
//! the cgroup filesystems share one grammar: a line per entry, a key, a
//! separator (`:` or a space), a numeric or textual value, and an optional
//! `kB` unit suffix. The set of keys drifts across kernel versions, so each
//! reader declares a [`Schema`] once (a map from file-side key to a typed
//! field setter, plus an optional fallback for keys it has never heard of)
//! and stays forward-compatible without central edits.
//!
//! A schema is built once per record type (typically in a
//! [`std::sync::LazyLock`]) and is read-only afterwards, so it can be shared
//! freely between threads.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::LazyLock;
//! use proclimits::kvparser::{Fallback, FieldSetter, KvFile, Schema};
//!
//! #[derive(Debug, Default)]
//! struct Sample {
//!     total: i64,
//!     rest: HashMap<String, i64>,
//! }
//!
//! static SCHEMA: LazyLock<Schema<Sample>> = LazyLock::new(|| {
//!     Schema::builder(" ")
//!         .field("total", FieldSetter::I64(|s: &mut Sample, v| s.total = v))
//!         .fallback(Fallback::I64(|s, k, v| {
//!             s.rest.insert(k.to_owned(), v);
//!         }))
//!         .build()
//! });
//!
//! impl KvFile for Sample {
//!     fn schema() -> &'static Schema<Self> {
//!         &SCHEMA
//!     }
//! }
//!
//! let sample = Sample::parse("total 12\nsomething_new 3\n").unwrap();
//! assert_eq!(sample.total, 12);
//! assert_eq!(sample.rest["something_new"], 3);
//! ```

mod error;

use std::collections::HashMap;

pub use error::{ParseError, Result};

/// A typed setter for one declared field of a record.
///
/// The variant fixes the width the file-side value must fit; a value that
/// parses but does not fit is an [`ParseError::Overflow`], never a silent
/// truncation. `Skip` declares a key as known-and-ignored.
pub enum FieldSetter<T> {
    I8(fn(&mut T, i8)),
    I16(fn(&mut T, i16)),
    I32(fn(&mut T, i32)),
    I64(fn(&mut T, i64)),
    U8(fn(&mut T, u8)),
    U16(fn(&mut T, u16)),
    U32(fn(&mut T, u32)),
    U64(fn(&mut T, u64)),
    F32(fn(&mut T, f32)),
    F64(fn(&mut T, f64)),
    Text(fn(&mut T, &str)),
    Skip,
}

/// The catch-all setter invoked for keys with no declared field.
///
/// The variant fixes the type unknown values are parsed as; a schema with
/// no fallback rejects unknown keys with [`ParseError::UnknownField`].
pub enum Fallback<T> {
    I64(fn(&mut T, &str, i64)),
    U64(fn(&mut T, &str, u64)),
    F64(fn(&mut T, &str, f64)),
    Text(fn(&mut T, &str, &str)),
}

/// A compiled description of one record type's file format: the key/value
/// separator, the declared fields, and the optional fallback.
pub struct Schema<T> {
    separator: &'static str,
    fields: HashMap<&'static str, FieldSetter<T>>,
    fallback: Option<Fallback<T>>,
}

/// Builder for [`Schema`]; see the module docs for the usual shape.
pub struct SchemaBuilder<T> {
    separator: &'static str,
    fields: HashMap<&'static str, FieldSetter<T>>,
    fallback: Option<Fallback<T>>,
}

impl<T> SchemaBuilder<T> {
    /// Declares a field keyed by its file-side name.
    pub fn field(mut self, key: &'static str, setter: FieldSetter<T>) -> Self {
        self.fields.insert(key, setter);
        self
    }

    /// Declares a key as known but uninteresting.
    pub fn ignore(mut self, key: &'static str) -> Self {
        self.fields.insert(key, FieldSetter::Skip);
        self
    }

    /// Declares the catch-all receiving every undeclared key.
    pub fn fallback(mut self, fallback: Fallback<T>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn build(self) -> Schema<T> {
        Schema {
            separator: self.separator,
            fields: self.fields,
            fallback: self.fallback,
        }
    }
}

/// Strips a trailing `kB` unit, returning the value multiplier it implies.
///
/// The suffix is the kernel's only unit annotation in these files; anything
/// else is passed through to the numeric parser untouched.
fn split_unit_suffix(value: &str) -> (&str, i64) {
    match value.strip_suffix("kB") {
        Some(stripped) => (stripped.trim_end(), 1024),
        None => (value, 1),
    }
}

impl<T> Schema<T> {
    /// Starts a schema for files whose lines split on the first `separator`.
    pub fn builder(separator: &'static str) -> SchemaBuilder<T> {
        SchemaBuilder {
            separator,
            fields: HashMap::new(),
            fallback: None,
        }
    }

    /// Decodes `content` into `out`, line by line.
    ///
    /// Empty lines are skipped. Each remaining line is split on the first
    /// occurrence of the schema separator; the value is trimmed, scaled by
    /// a trailing `kB` suffix for numeric fields, parsed in base 10, and
    /// written through the declared setter.
    ///
    /// # Errors
    ///
    /// Fails on a line with no separator, a value that does not parse as
    /// the declared type, a value that does not fit the declared width, or
    /// an unknown key when no fallback is declared. `out` must be discarded
    /// when an error is returned.
    pub fn parse_into(&self, content: &str, out: &mut T) -> Result<()> {
        for (idx, line) in content.split('\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let lineno = idx + 1;
            let (key, raw_value) =
                line.split_once(self.separator)
                    .ok_or_else(|| ParseError::MalformedLine {
                        line: lineno,
                        separator: self.separator,
                        content: line.to_owned(),
                    })?;
            let value = raw_value.trim();

            match self.fields.get(key) {
                Some(setter) => self.set_field(out, setter, key, value, lineno)?,
                None => match &self.fallback {
                    Some(fallback) => self.set_fallback(out, fallback, key, value, lineno)?,
                    None => {
                        return Err(ParseError::UnknownField {
                            key: key.to_owned(),
                            line: lineno,
                        })
                    }
                },
            }
        }
        Ok(())
    }

    /// Decodes `content` into a fresh `T::default()`.
    pub fn parse(&self, content: &str) -> Result<T>
    where
        T: Default,
    {
        let mut out = T::default();
        self.parse_into(content, &mut out)?;
        Ok(out)
    }

    fn set_field(
        &self,
        out: &mut T,
        setter: &FieldSetter<T>,
        key: &str,
        value: &str,
        lineno: usize,
    ) -> Result<()> {
        match setter {
            FieldSetter::I8(set) => set(out, narrow_int(key, value, lineno, "i8")?),
            FieldSetter::I16(set) => set(out, narrow_int(key, value, lineno, "i16")?),
            FieldSetter::I32(set) => set(out, narrow_int(key, value, lineno, "i32")?),
            FieldSetter::I64(set) => set(out, parse_int(key, value, lineno)?),
            FieldSetter::U8(set) => set(out, narrow_uint(key, value, lineno, "u8")?),
            FieldSetter::U16(set) => set(out, narrow_uint(key, value, lineno, "u16")?),
            FieldSetter::U32(set) => set(out, narrow_uint(key, value, lineno, "u32")?),
            FieldSetter::U64(set) => set(out, parse_uint(key, value, lineno)?),
            FieldSetter::F32(set) => set(out, narrow_float(key, value, lineno)?),
            FieldSetter::F64(set) => set(out, parse_float(key, value, lineno)?),
            FieldSetter::Text(set) => set(out, value),
            FieldSetter::Skip => {}
        }
        Ok(())
    }

    fn set_fallback(
        &self,
        out: &mut T,
        fallback: &Fallback<T>,
        key: &str,
        value: &str,
        lineno: usize,
    ) -> Result<()> {
        match fallback {
            Fallback::I64(set) => set(out, key, parse_int(key, value, lineno)?),
            Fallback::U64(set) => set(out, key, parse_uint(key, value, lineno)?),
            Fallback::F64(set) => set(out, key, parse_float(key, value, lineno)?),
            Fallback::Text(set) => set(out, key, value),
        }
        Ok(())
    }
}

fn parse_int(key: &str, value: &str, lineno: usize) -> Result<i64> {
    let (digits, multiplier) = split_unit_suffix(value);
    let parsed = digits
        .parse::<i64>()
        .map_err(|source| ParseError::BadInteger {
            key: key.to_owned(),
            value: value.to_owned(),
            line: lineno,
            source,
        })?;
    parsed
        .checked_mul(multiplier)
        .ok_or_else(|| ParseError::Overflow {
            key: key.to_owned(),
            value: value.to_owned(),
            line: lineno,
            width: "i64",
        })
}

fn parse_uint(key: &str, value: &str, lineno: usize) -> Result<u64> {
    let (digits, multiplier) = split_unit_suffix(value);
    let parsed = digits
        .parse::<u64>()
        .map_err(|source| ParseError::BadInteger {
            key: key.to_owned(),
            value: value.to_owned(),
            line: lineno,
            source,
        })?;
    parsed
        .checked_mul(multiplier as u64)
        .ok_or_else(|| ParseError::Overflow {
            key: key.to_owned(),
            value: value.to_owned(),
            line: lineno,
            width: "u64",
        })
}

fn parse_float(key: &str, value: &str, lineno: usize) -> Result<f64> {
    let (digits, multiplier) = split_unit_suffix(value);
    let parsed = digits
        .parse::<f64>()
        .map_err(|source| ParseError::BadFloat {
            key: key.to_owned(),
            value: value.to_owned(),
            line: lineno,
            source,
        })?;
    Ok(parsed * multiplier as f64)
}

fn narrow_int<N>(key: &str, value: &str, lineno: usize, width: &'static str) -> Result<N>
where
    N: TryFrom<i64>,
{
    let wide = parse_int(key, value, lineno)?;
    N::try_from(wide).map_err(|_| ParseError::Overflow {
        key: key.to_owned(),
        value: value.to_owned(),
        line: lineno,
        width,
    })
}

fn narrow_uint<N>(key: &str, value: &str, lineno: usize, width: &'static str) -> Result<N>
where
    N: TryFrom<u64>,
{
    let wide = parse_uint(key, value, lineno)?;
    N::try_from(wide).map_err(|_| ParseError::Overflow {
        key: key.to_owned(),
        value: value.to_owned(),
        line: lineno,
        width,
    })
}

fn narrow_float(key: &str, value: &str, lineno: usize) -> Result<f32> {
    let wide = parse_float(key, value, lineno)?;
    let narrowed = wide as f32;
    if narrowed.is_infinite() && wide.is_finite() {
        return Err(ParseError::Overflow {
            key: key.to_owned(),
            value: value.to_owned(),
            line: lineno,
            width: "f32",
        });
    }
    Ok(narrowed)
}

/// A record type decodable from a key/value pseudofile.
///
/// Implementors expose their compiled [`Schema`]; the provided `parse`
/// decodes into a defaulted record, leaving undeclared fields at their
/// default values when the file omits them (kernels routinely do).
pub trait KvFile: Default + Sized + 'static {
    fn schema() -> &'static Schema<Self>;

    fn parse(content: &str) -> Result<Self> {
        Self::schema().parse(content)
    }
}
