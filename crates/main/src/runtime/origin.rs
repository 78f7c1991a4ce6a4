////////////////////////////////////////////////////////////////////////////////
// This file is part of "Astra Meta", a runtime reflection layer for Rust     //
// types.                                                                     //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    panic::Location,
};

/// A pointer to the Rust source code location where a reflection entity has
/// been declared.
///
/// The registration functions of the [Factory](crate::runtime::Factory) are
/// annotated with `#[track_caller]`, so the Origin of each declared member
/// points to the user's code that called the builder function rather than
/// to the internals of this crate.
///
/// The [Display] implementation prints the location in the
/// `file:line:column` form.
#[derive(Clone, Copy, Default)]
pub struct Origin(Option<&'static Location<'static>>);

impl PartialEq for Origin {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for Origin {}

impl PartialOrd for Origin {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Origin {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Some(this), Some(other)) => this
                .file()
                .cmp(other.file())
                .then(this.line().cmp(&other.line()))
                .then(this.column().cmp(&other.column())),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

impl Hash for Origin {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(location) = self.0 {
            location.file().hash(state);
            location.line().hash(state);
            location.column().hash(state);
        }
    }
}

impl Debug for Origin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => formatter.write_str("Origin(nil)"),

            Some(location) => formatter
                .debug_struct("Origin")
                .field("file", &location.file())
                .field("line", &location.line())
                .field("column", &location.column())
                .finish(),
        }
    }
}

impl Display for Origin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => formatter.write_str("[?]"),

            Some(location) => formatter.write_fmt(format_args!(
                "{}:{}:{}",
                location.file(),
                location.line(),
                location.column(),
            )),
        }
    }
}

impl From<&'static Location<'static>> for Origin {
    #[inline(always)]
    fn from(value: &'static Location<'static>) -> Self {
        Self(Some(value))
    }
}

impl Origin {
    /// Returns an Origin that intentionally does not point to any Rust code.
    /// This is the [Default] value of this object.
    #[inline(always)]
    pub const fn nil() -> Self {
        Self(None)
    }

    /// Returns an Origin of the code that called the current function.
    ///
    /// If the current function is annotated with `#[track_caller]`, the
    /// location propagates further up the call stack.
    #[inline(always)]
    #[track_caller]
    pub fn caller() -> Self {
        Self(Some(Location::caller()))
    }

    /// Returns true if this instance is the [Nil Origin](Self::nil).
    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the Rust file path of this Origin, if any.
    #[inline(always)]
    pub fn file(&self) -> Option<&'static str> {
        self.0.map(|location| location.file())
    }

    /// Returns the one-based line number of this Origin, if any.
    #[inline(always)]
    pub fn line(&self) -> Option<u32> {
        self.0.map(|location| location.line())
    }

    /// This function is guaranteed to panic with the provided `message`.
    ///
    /// The panic message is prefixed with the source code location this
    /// Origin points to.
    #[inline(never)]
    pub fn blame<T>(&self, message: &str) -> T {
        match self.0 {
            Some(location) => panic!("{location}: {message}"),
            None => panic!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Origin;

    #[track_caller]
    fn declared_here() -> Origin {
        Origin::caller()
    }

    #[test]
    fn test_origin_caller() {
        let line = line!() + 1;
        let origin = declared_here();

        assert!(!origin.is_nil());
        assert_eq!(origin.line(), Some(line));
        assert!(origin.file().unwrap_or_default().ends_with("origin.rs"));
        assert!(origin.to_string().contains(&format!(":{line}:")));
    }

    #[test]
    fn test_origin_nil() {
        let origin = Origin::nil();

        assert!(origin.is_nil());
        assert_eq!(origin, Origin::default());
        assert_eq!(origin.to_string(), "[?]");
        assert_eq!(format!("{origin:?}"), "Origin(nil)");
    }
}
