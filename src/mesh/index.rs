//! Typed handles for mesh elements.
//!
//! Vertices, half-edges and faces are addressed through distinct newtypes so
//! they cannot be mixed up. The storage integer is chosen per mesh through
//! [`MeshIndex`] (`u16`, `u32` or `u64`); its maximum value is reserved as the
//! null handle.

use std::fmt;
use std::hash::Hash;

/// Integer type backing mesh handles.
pub trait MeshIndex: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    /// Reserved null value.
    const INVALID: Self;

    /// Narrow a `usize` into this type.
    fn from_usize(v: usize) -> Self;

    /// Widen into a `usize`.
    fn to_usize(self) -> usize;

    /// Whether this is anything other than [`INVALID`](Self::INVALID).
    #[inline]
    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

macro_rules! impl_mesh_index {
    ($($ty:ty),*) => {
        $(
            impl MeshIndex for $ty {
                const INVALID: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(v: usize) -> Self {
                    debug_assert!(
                        v < <$ty>::MAX as usize,
                        "index {} too large for {}",
                        v,
                        stringify!($ty)
                    );
                    v as $ty
                }

                #[inline]
                fn to_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_mesh_index!(u16, u32, u64);

macro_rules! mesh_handle {
    ($(#[$doc:meta])* $name:ident, $tag:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name<I: MeshIndex = u32>(I);

        impl<I: MeshIndex> $name<I> {
            /// Wrap a raw position in the element array.
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(I::from_usize(index))
            }

            /// The null handle.
            #[inline]
            pub fn invalid() -> Self {
                Self(I::INVALID)
            }

            /// Position in the element array.
            #[inline]
            pub fn index(self) -> usize {
                self.0.to_usize()
            }

            /// Whether this is not the null handle.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0.is_valid()
            }
        }

        impl<I: MeshIndex> fmt::Debug for $name<I> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, concat!($tag, "({})"), self.index())
                } else {
                    f.write_str(concat!($tag, "(INVALID)"))
                }
            }
        }

        impl<I: MeshIndex> Default for $name<I> {
            fn default() -> Self {
                Self::invalid()
            }
        }
    };
}

mesh_handle!(
    /// Handle of a vertex.
    VertexId,
    "V"
);
mesh_handle!(
    /// Handle of a half-edge.
    HalfEdgeId,
    "HE"
);
mesh_handle!(
    /// Handle of a face.
    FaceId,
    "F"
);
