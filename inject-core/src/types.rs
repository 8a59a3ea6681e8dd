//! Type identity: `TypeKey` with primitive/boxed normalisation.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// Erased shared value. Always an `Arc<X>` behind `dyn Any`.
pub(crate) type Erased = Arc<dyn Any + Send + Sync>;

/// Which form of a type a key was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    Plain,
    Primitive,
    Boxed,
}

/// Identity of a requested type. `P` and `Box<P>` are the same key for every primitive `P`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    raw: TypeId,
    name: &'static str,
    form: Form,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        let raw = TypeId::of::<T>();
        let (id, form) = match primitive_kind(raw) {
            Some(kind) if kind.boxed == raw => (kind.plain, Form::Boxed),
            Some(kind) => (kind.plain, Form::Primitive),
            None => (raw, Form::Plain),
        };
        Self {
            id,
            raw,
            name: type_name::<T>(),
            form,
        }
    }

    /// Full type name as reported by the compiler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped (`dyn app::Greeter` -> `dyn Greeter`).
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    pub fn form(&self) -> Form {
        self.form
    }

    /// Primitive (unboxed) keys never accept a null argument.
    pub fn is_primitive(&self) -> bool {
        self.form == Form::Primitive
    }

    /// `TypeId` of the exact form this key was taken from.
    pub fn raw(&self) -> TypeId {
        self.raw
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        *self == TypeKey::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut ident = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            ident.push(c);
        } else {
            out.push_str(last_segment(&ident));
            ident.clear();
            out.push(c);
        }
    }
    out.push_str(last_segment(&ident));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

type Convert = fn(&(dyn Any + Send + Sync)) -> Option<Erased>;

struct PrimitiveKind {
    plain: TypeId,
    boxed: TypeId,
    to_boxed: Convert,
    to_plain: Convert,
}

struct PrimitiveTable {
    kinds: Vec<PrimitiveKind>,
    index: HashMap<TypeId, usize>,
}

macro_rules! primitive_kinds {
    ($($p:ty),* $(,)?) => {
        vec![$(
            PrimitiveKind {
                plain: TypeId::of::<$p>(),
                boxed: TypeId::of::<Box<$p>>(),
                to_boxed: |value| {
                    value
                        .downcast_ref::<Arc<$p>>()
                        .map(|v| Arc::new(Arc::new(Box::new(**v))) as Erased)
                },
                to_plain: |value| {
                    value
                        .downcast_ref::<Arc<Box<$p>>>()
                        .map(|v| Arc::new(Arc::new(***v)) as Erased)
                },
            },
        )*]
    };
}

fn table() -> &'static PrimitiveTable {
    static TABLE: OnceLock<PrimitiveTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let kinds = primitive_kinds![
            bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
        ];
        let mut index = HashMap::with_capacity(kinds.len() * 2);
        for (i, kind) in kinds.iter().enumerate() {
            index.insert(kind.plain, i);
            index.insert(kind.boxed, i);
        }
        PrimitiveTable { kinds, index }
    })
}

fn primitive_kind(id: TypeId) -> Option<&'static PrimitiveKind> {
    let table = table();
    table.index.get(&id).map(|&i| &table.kinds[i])
}

/// Re-wraps an erased `Arc<P>` as `Arc<Box<P>>` (or the reverse) when `target` is the other form.
pub(crate) fn convert(value: &Erased, source: TypeId, target: TypeId) -> Option<Erased> {
    let kind = primitive_kind(target)?;
    if target == kind.boxed && source == kind.plain {
        (kind.to_boxed)(&**value)
    } else if target == kind.plain && source == kind.boxed {
        (kind.to_plain)(&**value)
    } else {
        None
    }
}
