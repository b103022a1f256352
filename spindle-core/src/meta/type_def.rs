// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::error::Error;
use crate::typed::GraphObject;
use crate::types::TypeCode;
use crate::value::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Declared type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Binary,
    BoolArray,
    Int16Array,
    Int32Array,
    Int64Array,
    Float32Array,
    Float64Array,
    List(Box<FieldType>),
    Set(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    /// A user type fully determined by the declaration.
    Object(Arc<str>),
    /// Any value; the runtime type travels on the wire.
    Any,
}

impl FieldType {
    pub fn list(elem: FieldType) -> FieldType {
        FieldType::List(Box::new(elem))
    }

    pub fn set(elem: FieldType) -> FieldType {
        FieldType::Set(Box::new(elem))
    }

    pub fn map(key: FieldType, value: FieldType) -> FieldType {
        FieldType::Map(Box::new(key), Box::new(value))
    }

    pub fn object(name: &str) -> FieldType {
        FieldType::Object(Arc::from(name))
    }

    pub fn code(&self) -> TypeCode {
        match self {
            FieldType::Bool => TypeCode::Bool,
            FieldType::Int8 => TypeCode::Int8,
            FieldType::Int16 => TypeCode::Int16,
            FieldType::Int32 => TypeCode::Int32,
            FieldType::Int64 => TypeCode::Int64,
            FieldType::Float32 => TypeCode::Float32,
            FieldType::Float64 => TypeCode::Float64,
            FieldType::String => TypeCode::String,
            FieldType::Binary => TypeCode::Binary,
            FieldType::BoolArray => TypeCode::BoolArray,
            FieldType::Int16Array => TypeCode::Int16Array,
            FieldType::Int32Array => TypeCode::Int32Array,
            FieldType::Int64Array => TypeCode::Int64Array,
            FieldType::Float32Array => TypeCode::Float32Array,
            FieldType::Float64Array => TypeCode::Float64Array,
            FieldType::List(_) => TypeCode::List,
            FieldType::Set(_) => TypeCode::Set,
            FieldType::Map(_, _) => TypeCode::Map,
            FieldType::Object(_) => TypeCode::Object,
            FieldType::Any => TypeCode::Any,
        }
    }

    /// The field type of a value-only builtin kind.
    pub fn from_code(code: TypeCode) -> Option<FieldType> {
        Some(match code {
            TypeCode::Bool => FieldType::Bool,
            TypeCode::Int8 => FieldType::Int8,
            TypeCode::Int16 => FieldType::Int16,
            TypeCode::Int32 => FieldType::Int32,
            TypeCode::Int64 => FieldType::Int64,
            TypeCode::Float32 => FieldType::Float32,
            TypeCode::Float64 => FieldType::Float64,
            TypeCode::String => FieldType::String,
            TypeCode::Binary => FieldType::Binary,
            TypeCode::BoolArray => FieldType::BoolArray,
            TypeCode::Int16Array => FieldType::Int16Array,
            TypeCode::Int32Array => FieldType::Int32Array,
            TypeCode::Int64Array => FieldType::Int64Array,
            TypeCode::Float32Array => FieldType::Float32Array,
            TypeCode::Float64Array => FieldType::Float64Array,
            TypeCode::List => FieldType::list(FieldType::Any),
            TypeCode::Set => FieldType::set(FieldType::Any),
            TypeCode::Map => FieldType::map(FieldType::Any, FieldType::Any),
            TypeCode::Any => FieldType::Any,
            TypeCode::Object => return None,
        })
    }

    #[inline(always)]
    pub fn is_primitive(&self) -> bool {
        self.code().is_primitive()
    }

    /// Whether a value of `self` on the wire can be read into a field declared `local`.
    ///
    /// Identical types always match. Integers widen to wider integers and to
    /// `float64`; narrow integers also widen to `float32`; `float32` widens to
    /// `float64`. Containers match when their element types do. `Any` accepts
    /// anything, and anything non-primitive can be read where `Any` was written
    /// (the runtime value is checked on assignment).
    pub fn promotes_to(&self, local: &FieldType) -> bool {
        use FieldType::*;
        if self == local {
            return true;
        }
        match (self, local) {
            (_, Any) => true,
            (Any, local) => !local.is_primitive(),
            (Int8, Int16 | Int32 | Int64 | Float32 | Float64) => true,
            (Int16, Int32 | Int64 | Float32 | Float64) => true,
            (Int32, Int64 | Float64) => true,
            (Float32, Float64) => true,
            (List(a), List(b)) | (Set(a), Set(b)) => a.promotes_to(b),
            (Map(ka, va), Map(kb, vb)) => ka.promotes_to(kb) && va.promotes_to(vb),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => f.write_str("bool"),
            FieldType::Int8 => f.write_str("int8"),
            FieldType::Int16 => f.write_str("int16"),
            FieldType::Int32 => f.write_str("int32"),
            FieldType::Int64 => f.write_str("int64"),
            FieldType::Float32 => f.write_str("float32"),
            FieldType::Float64 => f.write_str("float64"),
            FieldType::String => f.write_str("string"),
            FieldType::Binary => f.write_str("binary"),
            FieldType::BoolArray => f.write_str("bool[]"),
            FieldType::Int16Array => f.write_str("int16[]"),
            FieldType::Int32Array => f.write_str("int32[]"),
            FieldType::Int64Array => f.write_str("int64[]"),
            FieldType::Float32Array => f.write_str("float32[]"),
            FieldType::Float64Array => f.write_str("float64[]"),
            FieldType::List(e) => write!(f, "list<{e}>"),
            FieldType::Set(e) => write!(f, "set<{e}>"),
            FieldType::Map(k, v) => write!(f, "map<{k}, {v}>"),
            FieldType::Object(name) => f.write_str(name),
            FieldType::Any => f.write_str("any"),
        }
    }
}

/// Literal used when a field is absent from the stream.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
}

impl DefaultValue {
    /// Converts the literal to a value of `field_type`, if it fits.
    pub fn to_value(&self, field_type: &FieldType) -> Option<Value> {
        Some(match (self, field_type) {
            (DefaultValue::Bool(b), FieldType::Bool) => Value::Bool(*b),
            (DefaultValue::Int(i), FieldType::Int8) => Value::Int8(i8::try_from(*i).ok()?),
            (DefaultValue::Int(i), FieldType::Int16) => Value::Int16(i16::try_from(*i).ok()?),
            (DefaultValue::Int(i), FieldType::Int32) => Value::Int32(i32::try_from(*i).ok()?),
            (DefaultValue::Int(i), FieldType::Int64 | FieldType::Any) => Value::Int64(*i),
            (DefaultValue::Float(v), FieldType::Float32) => Value::Float32(*v as f32),
            (DefaultValue::Float(v), FieldType::Float64 | FieldType::Any) => Value::Float64(*v),
            (DefaultValue::Str(s), FieldType::String | FieldType::Any) => {
                Value::String(s.to_string())
            }
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: Arc<str>,
    /// Type that declared the field; disambiguates shadowed names.
    pub declaring: Arc<str>,
    pub field_type: FieldType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
}

impl FieldDef {
    /// Value a fresh object holds for this field.
    pub fn default_value(&self) -> Value {
        if let Some(value) = self.default.as_ref().and_then(|d| d.to_value(&self.field_type)) {
            return value;
        }
        if self.nullable {
            return Value::Null;
        }
        match self.field_type {
            FieldType::Bool => Value::Bool(false),
            FieldType::Int8 => Value::Int8(0),
            FieldType::Int16 => Value::Int16(0),
            FieldType::Int32 => Value::Int32(0),
            FieldType::Int64 => Value::Int64(0),
            FieldType::Float32 => Value::Float32(0.0),
            FieldType::Float64 => Value::Float64(0.0),
            _ => Value::Null,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// Fields are assigned in place; may take part in cycles.
    Struct,
    /// Built in one shot after all fields are decoded.
    Record,
}

/// Validates or normalizes decoded field values of a record.
///
/// Values arrive in declaration order. An `Err` becomes an
/// [`Error::Construction`] carrying the decoded values.
pub type RecordFactory = Arc<dyn Fn(&TypeDef, Vec<Value>) -> Result<Vec<Value>, String> + Send + Sync>;

/// A user type: a name plus an ordered field set.
#[derive(Clone)]
pub struct TypeDef {
    name: Arc<str>,
    kind: TypeKind,
    fields: Vec<FieldDef>,
    factory: Option<RecordFactory>,
}

impl TypeDef {
    pub fn builder(name: &str) -> TypeDefBuilder {
        TypeDefBuilder {
            name: Arc::from(name),
            kind: TypeKind::Struct,
            fields: Vec::new(),
            factory: None,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    #[inline(always)]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline(always)]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn factory(&self) -> Option<&RecordFactory> {
        self.factory.as_ref()
    }

    /// Index of the most derived field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| &*f.name == name)
    }

    pub fn field_index_qualified(&self, declaring: &str, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| &*f.name == name && &*f.declaring == declaring)
    }

    /// Same name and same fields, ignoring the factory.
    pub fn same_shape(&self, other: &TypeDef) -> bool {
        self.name == other.name && self.kind == other.kind && self.fields == other.fields
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

pub struct TypeDefBuilder {
    name: Arc<str>,
    kind: TypeKind,
    fields: Vec<FieldDef>,
    factory: Option<RecordFactory>,
}

impl TypeDefBuilder {
    /// Inherits every field of `parent`, keeping its declaring qualifiers.
    pub fn extends(mut self, parent: &TypeDef) -> Self {
        let mut inherited = parent.fields.clone();
        inherited.append(&mut self.fields);
        self.fields = inherited;
        self
    }

    pub fn field(self, name: &str, field_type: FieldType) -> Self {
        let nullable = !field_type.is_primitive();
        self.push(name, field_type, nullable, None)
    }

    /// A field that may hold null; primitives become boxed.
    pub fn nullable_field(self, name: &str, field_type: FieldType) -> Self {
        self.push(name, field_type, true, None)
    }

    pub fn field_with_default(self, name: &str, field_type: FieldType, default: DefaultValue) -> Self {
        let nullable = !field_type.is_primitive();
        self.push(name, field_type, nullable, Some(default))
    }

    pub fn field_with(self, name: &str, field_type: FieldType, nullable: bool) -> Self {
        self.push(name, field_type, nullable, None)
    }

    /// A field typed after `T`: nullable when `T` is optional or not a primitive.
    pub fn field_of<T: GraphObject>(self, name: &str) -> Self {
        let field_type = T::field_type();
        let nullable = T::nullable() || !field_type.is_primitive();
        self.push(name, field_type, nullable, None)
    }

    /// A field attributed to `declaring` instead of the type being built.
    pub fn declared_field(
        mut self,
        declaring: &str,
        name: &str,
        field_type: FieldType,
        nullable: bool,
    ) -> Self {
        self.fields.push(FieldDef {
            name: Arc::from(name),
            declaring: Arc::from(declaring),
            field_type,
            nullable,
            default: None,
        });
        self
    }

    fn push(
        mut self,
        name: &str,
        field_type: FieldType,
        nullable: bool,
        default: Option<DefaultValue>,
    ) -> Self {
        self.fields.push(FieldDef {
            name: Arc::from(name),
            declaring: self.name.clone(),
            field_type,
            nullable,
            default,
        });
        self
    }

    /// Marks the type as a record, optionally validated by `factory`.
    pub fn record(mut self) -> Self {
        self.kind = TypeKind::Record;
        self
    }

    pub fn record_with<F>(mut self, factory: F) -> Self
    where
        F: Fn(&TypeDef, Vec<Value>) -> Result<Vec<Value>, String> + Send + Sync + 'static,
    {
        self.kind = TypeKind::Record;
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Result<TypeDef, Error> {
        if self.name.is_empty() {
            return Err(Error::not_allowed("type name must not be empty"));
        }
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(Error::not_allowed(format!(
                    "type `{}` declares a field with an empty name",
                    self.name
                )));
            }
            if !seen.insert((field.declaring.clone(), field.name.clone())) {
                return Err(Error::not_allowed(format!(
                    "type `{}` declares field `{}.{}` twice",
                    self.name, field.declaring, field.name
                )));
            }
            if let Some(default) = &field.default {
                if default.to_value(&field.field_type).is_none() {
                    return Err(Error::not_allowed(format!(
                        "default {:?} does not fit field `{}` of type {}",
                        default, field.name, field.field_type
                    )));
                }
            }
        }
        Ok(TypeDef {
            name: self.name,
            kind: self.kind,
            fields: self.fields,
            factory: self.factory,
        })
    }
}
