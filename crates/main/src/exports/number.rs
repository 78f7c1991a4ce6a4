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

use std::any::TypeId;

use crate::runtime::{reflect, Factory, MetaResult, Property};

// The key of the property attached to every builtin numeric type. The value
// is true for the floating-point types.
static FLOAT: &'static str = "float";

macro_rules! declare_numbers {
    (@each $targets:tt $($name:literal => $ty:ty: $float:expr),*) => {
        $(
            declare_numbers!(@one $targets $name => $ty: $float);
        )*
    };

    (@one [$($to:ty),*] $name:literal => $from:ty: $float:expr) => {
        let numeric = reflect::<$from>($name, [Property::new(FLOAT, $float)])?;

        $(
            let numeric = cast_conversion::<$from, $to>(numeric)?;
        )*

        let _ = numeric;
    };

    ($($name:literal => $ty:ty: $float:expr),* $(,)?) => {
        declare_numbers!(@each [$($ty),*] $($name => $ty: $float),*);
    };
}

pub(super) fn register() -> MetaResult<()> {
    declare_numbers! {
        "i8" => i8: false,
        "i16" => i16: false,
        "i32" => i32: false,
        "i64" => i64: false,
        "i128" => i128: false,
        "isize" => isize: false,
        "u8" => u8: false,
        "u16" => u16: false,
        "u32" => u32: false,
        "u64" => u64: false,
        "u128" => u128: false,
        "usize" => usize: false,
        "f32" => f32: true,
        "f64" => f64: true,
    }

    Ok(())
}

// The cast crate returns either the target value for the lossless casts, or
// a Result for the casts that may fail.
trait CastOutput<To> {
    fn into_cast(self) -> Option<To>;
}

macro_rules! impl_cast_output {
    ($($ty:ty),*) => {
        $(
            impl CastOutput<$ty> for $ty {
                #[inline(always)]
                fn into_cast(self) -> Option<$ty> {
                    Some(self)
                }
            }

            impl CastOutput<$ty> for Result<$ty, cast::Error> {
                #[inline(always)]
                fn into_cast(self) -> Option<$ty> {
                    self.ok()
                }
            }
        )*
    };
}

impl_cast_output!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

#[track_caller]
fn cast_conversion<F, To>(numeric: Factory<F>) -> MetaResult<Factory<F>>
where
    F: Copy + Send + Sync + 'static,
    To: cast::From<F> + Send + Sync + 'static,
    <To as cast::From<F>>::Output: CastOutput<To>,
{
    if TypeId::of::<F>() == TypeId::of::<To>() {
        return Ok(numeric);
    }

    numeric.conversion_checked(|from: &F| <To as cast::From<F>>::cast(*from).into_cast())
}

#[cfg(test)]
mod tests {
    use crate::{
        exports::{number::FLOAT, register},
        runtime::{reflect, resolve, resolve_name, Cell, Handle, MetaResultExt},
    };

    #[derive(Clone)]
    struct Pixel {
        x: i32,
        y: f32,
        rgb: [u8; 3],
    }

    #[test]
    fn test_numeric_conversions() {
        register().expect_blame("builtins registration failed");

        let mut lossless = Cell::give(7u8);

        assert!(lossless.convert::<i64>());
        assert_eq!(lossless.try_cast::<i64>(), Some(&7));

        let mut overflow = Cell::give(-1i32);

        assert!(!overflow.convert::<u32>());
        assert_eq!(overflow.try_cast::<i32>(), Some(&-1));

        let mut float = Cell::give(2.5f64);

        assert!(float.convert::<f32>());
        assert_eq!(float.try_cast::<f32>(), Some(&2.5));

        let mut nan = Cell::give(f32::NAN);

        assert!(!nan.convert::<i16>());

        assert_eq!(resolve_name("u128"), Some(resolve::<u128>()));
        assert_eq!(
            resolve::<f32>().prop(&FLOAT).map(|prop| prop.value().take::<bool>()),
            Some(Some(true)),
        );
        assert_eq!(
            resolve::<u8>().prop(&FLOAT).map(|prop| prop.value().take::<bool>()),
            Some(Some(false)),
        );
        assert_eq!(resolve::<usize>().conversions().len(), 13);
        assert!(resolve::<usize>().conversion(resolve::<usize>()).is_none());
    }

    #[test]
    fn test_numeric_arguments() {
        register().expect_blame("builtins registration failed");

        let _ = reflect::<Pixel>("number::Pixel", [])
            .and_then(|factory| {
                factory.constructor(|x: i32, y: f32| Pixel { x, y, rgb: [0; 3] }, [])
            })
            .and_then(|factory| {
                factory.data_array("rgb", |pixel| &pixel.rgb, |pixel| &mut pixel.rgb, [])
            })
            .and_then(|factory| factory.method("sum", |pixel: &Pixel| pixel.x as f32 + pixel.y, []))
            .expect_blame("Pixel declaration failed");

        let ty = resolve::<Pixel>();

        let pixel = ty.construct(&[Cell::give(3i32), Cell::give(4i32)]);

        assert_eq!(pixel.try_cast::<Pixel>().map(|pixel| pixel.y), Some(4.0));

        assert!(ty.construct(&[Cell::give("x"), Cell::give(4.0f32)]).is_nil());

        let sum = ty.func("sum").expect("missing sum");

        assert_eq!(sum.invoke(pixel.handle(), &[]).try_cast::<f32>(), Some(&7.0));
        assert!(sum.invoke(Handle::new(&3i32), &[]).is_nil());

        let mut pixel = pixel.take::<Pixel>().expect("construction failed");
        let rgb = ty.data("rgb").expect("missing rgb");

        assert!(rgb.set_at(Handle::new_mut(&mut pixel), Cell::give(1i32), Cell::give(200u32)));
        assert!(!rgb.set_at(Handle::new_mut(&mut pixel), Cell::give(2i32), Cell::give(300u32)));
        assert!(!rgb.set_at(Handle::new_mut(&mut pixel), Cell::give(-1i32), Cell::give(1u8)));
        assert_eq!(pixel.rgb, [0, 200, 0]);
        assert_eq!(
            rgb.get_at(Handle::new(&pixel), Cell::give(1u64)).try_cast::<u8>(),
            Some(&200),
        );
    }
}
