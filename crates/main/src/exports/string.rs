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

use crate::runtime::{reflect, MetaResult};

pub(super) fn register() -> MetaResult<()> {
    let _ = reflect::<&'static str>("str", [])?
        .conversion_with(|string: &&'static str| String::from(*string))?
        .method("len", |string: &&'static str| string.len(), [])?;

    let _ = reflect::<String>("string", [])?
        .constructor(|string: &'static str| String::from(string), [])?
        .method("len", |string: &String| string.len(), [])?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        exports::register,
        runtime::{resolve, resolve_name, Cell, Handle, MetaResultExt},
    };

    #[test]
    fn test_string_builtins() {
        register().expect_blame("builtins registration failed");

        let string = resolve_name("string").expect("missing string type");

        assert_eq!(string, resolve::<String>());

        let constructed = string.construct(&[Cell::give("orbit")]);

        assert_eq!(constructed.try_cast::<String>().map(String::as_str), Some("orbit"));

        let len = string.func("len").expect("missing len");

        assert_eq!(
            len.invoke(constructed.handle(), &[]).try_cast::<usize>(),
            Some(&5),
        );

        let len = resolve::<&'static str>().func("len").expect("missing len");

        assert_eq!(
            len.invoke(Handle::new(&"moon"), &[]).try_cast::<usize>(),
            Some(&4),
        );

        let mut converted = Cell::give("sun");

        assert!(converted.convert::<String>());
        assert_eq!(converted.try_cast::<String>().map(String::as_str), Some("sun"));
    }
}
