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

//! # Astra Meta
//!
//! A runtime reflection layer for Rust types.
//!
//! The crate maintains a process-wide registry of the reflection metadata.
//! You declare the metadata of your types through the
//! [Factory](runtime::Factory) builder: the type name, the base types, the
//! conversions, the constructors, the destructor, the data members, the
//! functions, and the arbitrary key-value properties attached to them.
//!
//! The declared metadata can then be queried by the [TypeRef](runtime::TypeRef)
//! descriptors, and the declared members can be used through the type-erased
//! [Cell](runtime::Cell) values and [Handle](runtime::Handle) references
//! without knowing the concrete Rust types at the call site.
//!
//! ```
//! use astra_meta::runtime::{reflect, resolve_name, Cell, Handle};
//!
//! #[derive(Clone)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! reflect::<Counter>("lib::Counter", [])
//!     .and_then(|factory| factory.constructor(|value: i64| Counter { value }, []))
//!     .and_then(|factory| {
//!         factory.method_mut("add", |counter: &mut Counter, delta: i64| counter.value += delta, [])
//!     })
//!     .and_then(|factory| {
//!         factory.data_field("value", |counter| &counter.value, |counter| &mut counter.value, [])
//!     })
//!     .unwrap();
//!
//! let ty = resolve_name("lib::Counter").unwrap();
//!
//! let mut counter = ty.construct(&[Cell::give(10i64)]);
//!
//! let add = ty.func("add").unwrap();
//! assert!(add.invoke(counter.handle_mut(), &[Cell::give(5i64)]).is_void());
//!
//! let value = ty.data("value").unwrap().get(counter.handle());
//! assert_eq!(value.try_cast::<i64>(), Some(&15));
//! ```
//!
//! ## Builtins
//!
//! With the `builtins` feature enabled (default), the [exports] module
//! declares the metadata of the Rust primitive types: the numeric types with
//! the lossless-checked conversions between each other, `bool`, `str`, and
//! `String`. Call [exports::register] once to populate the registry.
//!
//! ## Copyright
//!
//! This work is proprietary software with source-available code.
//!
//! Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин). All rights reserved.

/// Builtin reflection metadata of the Rust primitive types.
#[cfg(feature = "builtins")]
pub mod exports;

/// The reflection registry, the declaration builder, and the type-erased
/// values.
pub mod runtime;
