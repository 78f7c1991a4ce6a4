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

mod cell;
mod coercion;
mod data;
mod error;
mod factory;
mod handle;
mod ident;
mod invoke;
mod members;
mod origin;
mod registry;
mod ty;

pub use crate::runtime::{
    cell::Cell,
    coercion::Extends,
    error::{MetaError, MetaResult, MetaResultExt},
    factory::{factory, reflect, unregister, Factory},
    handle::Handle,
    ident::{hash_name, Ident},
    invoke::{ArgList, Callable, ConstMethod, MutMethod},
    members::{BaseRef, ConvRef, CtorRef, DataRef, DtorRef, FuncRef, PropRef, Property},
    origin::Origin,
    registry::{reset, MemberKind},
    ty::{resolve, resolve_all, resolve_name, TypeRef},
};
