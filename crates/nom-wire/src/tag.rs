/// An 8-bit discriminator identifying a codec variant on the wire.
///
/// Tag assignment is process-global and must be deterministic across
/// peers: the reserved tags below are fixed, and additional variants
/// registered with a [`Codec`](crate::codec::Codec) are assigned in
/// registration order starting at [`Tag::USER`] unless a variant pins
/// an explicit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub u8);

impl Tag {
    pub const INT: Tag = Tag(1);
    pub const LONG: Tag = Tag(2);
    pub const FLOAT: Tag = Tag(3);
    pub const BYTES: Tag = Tag(4);
    pub const TEXT: Tag = Tag(5);
    pub const BOOL: Tag = Tag(6);
    pub const SEQ: Tag = Tag(7);
    pub const MAP: Tag = Tag(8);
    pub const BYTE: Tag = Tag(9);
    pub const NONE: Tag = Tag(10);
    pub const SLICE: Tag = Tag(11);
    pub const ELLIPSIS: Tag = Tag(12);
    pub const ERROR: Tag = Tag(13);

    /// First tag available for user-registered variants.
    pub const USER: u8 = 14;

    /// The object-handle variant always lives at the reserved top tag.
    pub const HANDLE: Tag = Tag(255);

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for Tag {
    fn from(v: u8) -> Self {
        Tag(v)
    }
}
