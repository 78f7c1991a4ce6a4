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
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use ahash::RandomState;
use compact_str::CompactString;
use lady_deirdre::sync::Lazy;

/// A name of a reflected type or member together with its numeric id.
///
/// The id is a deterministic hash of the name string (see [hash_name]). Two
/// Idents are equal if their names are equal.
#[derive(Clone)]
pub struct Ident {
    string: CompactString,
    id: u64,
}

impl Debug for Ident {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{:?}#{:016x}", self.string, self.id))
    }
}

impl Display for Ident {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.string, formatter)
    }
}

impl AsRef<str> for Ident {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.string.as_str()
    }
}

impl PartialEq for Ident {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id) && self.string.eq(&other.string)
    }
}

impl Eq for Ident {}

impl Hash for Ident {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Ident {
    /// Creates an Ident from the name string computing its id.
    #[inline(always)]
    pub fn new(string: impl Into<CompactString>) -> Self {
        let string = string.into();
        let id = hash_name(string.as_str());

        Self { string, id }
    }

    /// Returns the name string.
    #[inline(always)]
    pub fn string(&self) -> &CompactString {
        &self.string
    }

    /// Returns the numeric id of the name.
    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Computes the numeric id of a type or member name.
///
/// The function is deterministic within the same build of the program: the
/// same string always produces the same id. Types and members share the same
/// id space.
///
/// ```
/// use astra_meta::runtime::hash_name;
///
/// assert_eq!(hash_name("position"), hash_name("position"));
/// assert_ne!(hash_name("position"), hash_name("velocity"));
/// ```
#[inline]
pub fn hash_name(name: &str) -> u64 {
    static STATE: Lazy<RandomState> = Lazy::new(|| {
        RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        )
    });

    STATE.hash_one(name)
}

#[cfg(test)]
mod tests {
    use crate::runtime::{hash_name, Ident};

    #[test]
    fn test_ident_hash() {
        let first = Ident::new("health");
        let second = Ident::new(String::from("health"));

        assert_eq!(first, second);
        assert_eq!(first.id(), hash_name("health"));
        assert_eq!(first.string().as_str(), "health");
        assert_ne!(first.id(), Ident::new("mana").id());
        assert_eq!(first.to_string(), "health");
    }
}
