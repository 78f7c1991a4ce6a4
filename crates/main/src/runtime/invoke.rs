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

use std::any::Any;

use crate::runtime::{Cell, Handle, TypeRef};

pub(crate) type Invoke = Box<dyn Fn(Handle<'_>, &[Cell]) -> Cell + Send + Sync + 'static>;

pub(crate) type Construct = Box<dyn Fn(&[Cell]) -> Cell + Send + Sync + 'static>;

/// A tuple of Rust function parameter types.
///
/// This trait is implemented for the tuples of up to seven elements, where
/// each element is a `Clone + Send + Sync + 'static` type. It describes the
/// formal parameters of the reflected functions and constructors, and it
/// resolves the type-erased arguments of a call into these parameters.
///
/// ```
/// use astra_meta::runtime::{ArgList, Cell};
///
/// assert_eq!(<(u8, String)>::ARITY, 2);
///
/// let resolved = <(u8, String)>::resolve(&[Cell::give(3u8), Cell::give(String::from("x"))]);
/// assert_eq!(resolved, Some((3, String::from("x"))));
///
/// let resolved = <(u8, String)>::resolve(&[Cell::give(String::from("x")), Cell::give(3u8)]);
/// assert_eq!(resolved, None);
/// ```
pub trait ArgList: Sized + Send + Sync + 'static {
    /// The number of the parameters.
    const ARITY: usize;

    /// Returns the types of the parameters in order.
    fn types() -> Vec<TypeRef>;

    /// Resolves the type-erased `arguments` into the parameter values.
    ///
    /// Each argument is first extracted by the exact type match. If the
    /// argument has a different type, the function tries to
    /// [convert](Cell::convert) a copy of the argument into the parameter
    /// type. The original `arguments` remain unchanged.
    ///
    /// Returns None if the number of arguments does not match the arity, or
    /// if any of the arguments cannot be resolved.
    fn resolve(arguments: &[Cell]) -> Option<Self>;
}

/// A Rust function that can be reflected as a free (static) function or as
/// a constructor.
///
/// The trait is implemented for any `Fn(A1, A2, ...) -> R` of up to seven
/// parameters. The `Args` type parameter is the tuple of the function
/// parameter types.
pub trait Callable<Args: ArgList>: Send + Sync + 'static {
    /// The return type of the function.
    type Output: Send + Sync + 'static;

    /// Calls the function with the resolved arguments.
    fn call(&self, args: Args) -> Self::Output;
}

/// A Rust function that can be reflected as a method of `T` receiving the
/// instance by shared reference.
///
/// The trait is implemented for any `Fn(&T, A1, A2, ...) -> R` of up to seven
/// parameters not counting the receiver.
pub trait ConstMethod<T, Args: ArgList>: Send + Sync + 'static {
    /// The return type of the method.
    type Output: Send + Sync + 'static;

    /// Calls the method with the instance and the resolved arguments.
    fn call(&self, this: &T, args: Args) -> Self::Output;
}

/// A Rust function that can be reflected as a method of `T` receiving the
/// instance by mutable reference.
///
/// The trait is implemented for any `Fn(&mut T, A1, A2, ...) -> R` of up to
/// seven parameters not counting the receiver.
pub trait MutMethod<T, Args: ArgList>: Send + Sync + 'static {
    /// The return type of the method.
    type Output: Send + Sync + 'static;

    /// Calls the method with the instance and the resolved arguments.
    fn call(&self, this: &mut T, args: Args) -> Self::Output;
}

// Resolves a single argument: the exact match first, then the conversion of
// a copy of the argument.
#[inline]
pub(crate) fn resolve_argument<T: Clone + Send + Sync + 'static>(argument: &Cell) -> Option<T> {
    if let Some(value) = argument.try_cast::<T>() {
        return Some(value.clone());
    }

    let mut converted = argument.clone();

    if !converted.convert::<T>() {
        return None;
    }

    converted.take::<T>()
}

macro_rules! impl_arity {
    ([$arity:expr] $($arg:ident: $var:ident),*) => {
        impl<$($arg, )*> ArgList for ($($arg, )*)
        where
            $($arg: Clone + Send + Sync + 'static,)*
        {
            const ARITY: usize = $arity;

            #[inline]
            fn types() -> Vec<TypeRef> {
                vec![$(TypeRef::of::<$arg>()),*]
            }

            #[inline]
            fn resolve(arguments: &[Cell]) -> Option<Self> {
                let [$($var),*] = arguments else {
                    return None;
                };

                $(
                let $var = resolve_argument::<$arg>($var);
                )*

                Some(($($var?, )*))
            }
        }

        impl<F, R $(, $arg)*> Callable<($($arg, )*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Send + Sync + 'static,
            $($arg: Clone + Send + Sync + 'static,)*
        {
            type Output = R;

            #[inline(always)]
            fn call(&self, ($($var, )*): ($($arg, )*)) -> R {
                self($($var),*)
            }
        }

        impl<F, T, R $(, $arg)*> ConstMethod<T, ($($arg, )*)> for F
        where
            F: Fn(&T $(, $arg)*) -> R + Send + Sync + 'static,
            R: Send + Sync + 'static,
            $($arg: Clone + Send + Sync + 'static,)*
        {
            type Output = R;

            #[inline(always)]
            fn call(&self, this: &T, ($($var, )*): ($($arg, )*)) -> R {
                self(this $(, $var)*)
            }
        }

        impl<F, T, R $(, $arg)*> MutMethod<T, ($($arg, )*)> for F
        where
            F: Fn(&mut T $(, $arg)*) -> R + Send + Sync + 'static,
            R: Send + Sync + 'static,
            $($arg: Clone + Send + Sync + 'static,)*
        {
            type Output = R;

            #[inline(always)]
            fn call(&self, this: &mut T, ($($var, )*): ($($arg, )*)) -> R {
                self(this $(, $var)*)
            }
        }
    };
}

impl_arity!([0]);
impl_arity!([1] A1: a1);
impl_arity!([2] A1: a1, A2: a2);
impl_arity!([3] A1: a1, A2: a2, A3: a3);
impl_arity!([4] A1: a1, A2: a2, A3: a3, A4: a4);
impl_arity!([5] A1: a1, A2: a2, A3: a3, A4: a4, A5: a5);
impl_arity!([6] A1: a1, A2: a2, A3: a3, A4: a4, A5: a5, A6: a6);
impl_arity!([7] A1: a1, A2: a2, A3: a3, A4: a4, A5: a5, A6: a6, A7: a7);

pub(crate) fn function_wrapper<Args, F>(function: F) -> Invoke
where
    Args: ArgList,
    F: Callable<Args>,
{
    Box::new(move |_: Handle<'_>, arguments: &[Cell]| match Args::resolve(arguments) {
        Some(args) => Cell::give(function.call(args)),
        None => Cell::nil(),
    })
}

pub(crate) fn method_wrapper<T, Args, F>(method: F) -> Invoke
where
    T: Any,
    Args: ArgList,
    F: ConstMethod<T, Args>,
{
    Box::new(move |instance: Handle<'_>, arguments: &[Cell]| {
        let this = instance.data::<T>();
        let args = Args::resolve(arguments);

        match (this, args) {
            (Some(this), Some(args)) => Cell::give(method.call(this, args)),
            _ => Cell::nil(),
        }
    })
}

pub(crate) fn method_mut_wrapper<T, Args, F>(method: F) -> Invoke
where
    T: Any,
    Args: ArgList,
    F: MutMethod<T, Args>,
{
    Box::new(move |mut instance: Handle<'_>, arguments: &[Cell]| {
        let args = Args::resolve(arguments);
        let this = instance.data_mut::<T>();

        match (this, args) {
            (Some(this), Some(args)) => Cell::give(method.call(this, args)),
            _ => Cell::nil(),
        }
    })
}

pub(crate) fn constructor_wrapper<T, Args, F>(constructor: F) -> Construct
where
    T: Send + Sync + 'static,
    Args: ArgList,
    F: Callable<Args, Output = T>,
{
    Box::new(move |arguments: &[Cell]| match Args::resolve(arguments) {
        Some(args) => Cell::give(constructor.call(args)),
        None => Cell::nil(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::runtime::{
        invoke::{function_wrapper, method_mut_wrapper, method_wrapper},
        ArgList,
        Cell,
        Handle,
    };

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        total: i64,
    }

    impl Counter {
        fn add(&mut self, amount: i64) {
            self.total += amount;
        }

        fn total(&self) -> i64 {
            self.total
        }
    }

    #[test]
    fn test_arg_list_resolution() {
        assert_eq!(<()>::ARITY, 0);
        assert_eq!(<(i32, u8, char)>::ARITY, 3);
        assert_eq!(<()>::resolve(&[]), Some(()));
        assert_eq!(<()>::resolve(&[Cell::give(1u8)]), None);

        let types = <(i32, String)>::types();

        assert_eq!(types.len(), 2);
        assert!(types[0].is::<i32>());
        assert!(types[1].is::<String>());

        assert_eq!(<(i32,)>::resolve(&[Cell::nil()]), None);
        assert_eq!(<(i32,)>::resolve(&[]), None);
        assert_eq!(
            <(i32, char)>::resolve(&[Cell::give(1i32), Cell::give('a')]),
            Some((1, 'a')),
        );
    }

    #[test]
    fn test_no_partial_invocation() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let wrapper = function_wrapper(|first: u32, second: u32| {
            let _ = CALLS.fetch_add(1, Ordering::SeqCst);

            first + second
        });

        let result = wrapper(Handle::nil(), &[Cell::give(1u32), Cell::give("two")]);

        assert!(result.is_nil());
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        let result = wrapper(Handle::nil(), &[Cell::give(1u32), Cell::give(2u32)]);

        assert_eq!(result.try_cast::<u32>(), Some(&3));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_void_result() {
        let add = method_mut_wrapper(Counter::add);
        let total = method_wrapper(Counter::total);

        let mut counter = Counter { total: 0 };

        let result = add(Handle::new_mut(&mut counter), &[Cell::give(5i64)]);

        assert!(result.has_value());
        assert!(result.is_void());
        assert_eq!(counter.total, 5);

        let result = add(Handle::new_mut(&mut counter), &[Cell::give("five")]);

        assert!(!result.has_value());
        assert_eq!(counter.total, 5);

        let result = add(Handle::new(&counter), &[Cell::give(5i64)]);

        assert!(result.is_nil());

        let result = total(Handle::new(&counter), &[]);

        assert_eq!(result.try_cast::<i64>(), Some(&5));

        let result = total(Handle::new(&10i64), &[]);

        assert!(result.is_nil());
    }
}
