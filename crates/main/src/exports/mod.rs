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

use std::sync::Mutex;

use log::{debug, warn};

use crate::runtime::{resolve, resolve_name, unregister, MetaResult, TypeRef};

mod boolean;
mod number;
mod string;

static BUILTINS_LOG: &'static str = "astra-meta::$builtins";

/// Declares the reflection metadata of the Rust primitive types.
///
/// | Rust type      | Declared name | Members                                      |
/// |----------------|---------------|----------------------------------------------|
/// | `bool`         | `"bool"`      | `not`, `and`, `or` methods                    |
/// | `i8` .. `u128` | Rust name     | checked conversions into each numeric type    |
/// | `f32`, `f64`   | Rust name     | checked conversions into each numeric type    |
/// | `&'static str` | `"str"`       | conversion into `String`, `len` method        |
/// | `String`       | `"string"`    | constructor from `&'static str`, `len` method |
///
/// A numeric conversion fails if the value does not fit the target type:
/// on overflow, on underflow, and for the infinite and NaN floats converted
/// into an integer type.
///
/// The function is idempotent: once the builtins are registered, the
/// subsequent calls do nothing. After the registry [reset](crate::runtime::reset),
/// the function registers the builtins again.
///
/// ```
/// use astra_meta::{
///     exports::register,
///     runtime::{resolve_name, Cell},
/// };
///
/// register().unwrap();
/// register().unwrap();
///
/// let mut value = Cell::give(300i32);
///
/// assert!(!value.convert::<u8>());
/// assert!(value.convert::<u16>());
/// assert_eq!(value.try_cast::<u16>(), Some(&300));
///
/// assert!(resolve_name("string").is_some());
/// ```
///
/// If any builtin declaration is rejected, the function unregisters the
/// builtin types it has declared so far and returns the error. The next call
/// starts over.
///
/// ```
/// use astra_meta::{
///     exports::register,
///     runtime::{reflect, resolve, unregister, MetaError},
/// };
///
/// struct Impostor;
///
/// reflect::<Impostor>("u16", []).unwrap();
///
/// assert!(matches!(register(), Err(MetaError::IdCollision { .. })));
/// assert!(!resolve::<bool>().is_registered());
/// assert!(!resolve::<u8>().is_registered());
/// assert!(register().is_err());
///
/// assert!(unregister::<Impostor>());
///
/// register().unwrap();
///
/// assert!(resolve::<u16>().is_registered());
/// assert!(resolve::<u32>().is_registered());
/// assert!(resolve::<String>().is_registered());
/// ```
pub fn register() -> MetaResult<()> {
    static GUARD: Mutex<()> = Mutex::new(());

    let _guard = GUARD.lock().unwrap_or_else(|poison| poison.into_inner());

    let builtins = builtins();

    if builtins.iter().all(Builtin::is_declared) {
        return Ok(());
    }

    let registered = builtins.each_ref().map(|builtin| builtin.ty.is_registered());

    let result = boolean::register()
        .and_then(|()| number::register())
        .and_then(|()| string::register());

    if let Err(error) = result {
        for (builtin, registered) in builtins.iter().zip(registered) {
            if !registered {
                let _ = (builtin.unregister)();
            }
        }

        warn!(target: BUILTINS_LOG, "Builtin types registration rejected. {error}");

        return Err(error);
    }

    debug!(target: BUILTINS_LOG, "Builtin types registered.");

    Ok(())
}

struct Builtin {
    name: &'static str,
    ty: TypeRef,
    unregister: fn() -> bool,
}

impl Builtin {
    #[inline(always)]
    fn is_declared(&self) -> bool {
        resolve_name(self.name) == Some(self.ty)
    }
}

macro_rules! builtin_table {
    ($($name:literal => $ty:ty),* $(,)?) => {
        [$(
            Builtin {
                name: $name,
                ty: resolve::<$ty>(),
                unregister: unregister::<$ty>,
            },
        )*]
    };
}

fn builtins() -> [Builtin; 17] {
    builtin_table! {
        "bool" => bool,
        "i8" => i8,
        "i16" => i16,
        "i32" => i32,
        "i64" => i64,
        "i128" => i128,
        "isize" => isize,
        "u8" => u8,
        "u16" => u16,
        "u32" => u32,
        "u64" => u64,
        "u128" => u128,
        "usize" => usize,
        "f32" => f32,
        "f64" => f64,
        "str" => &'static str,
        "string" => String,
    }
}
