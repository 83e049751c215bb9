/// The address geometry of a single cache level
///
/// Splits 32-bit addresses into a set index and a tag. The block offset is shared by every level
/// in a hierarchy, so it is never part of the tag or the index; anything below it is discarded
///
/// The inverse, [`Geometry::block_of`], rebuilds the address bits above the block offset from a
/// set index and a tag. As the block offset is common, that value can be re-decoded against any
/// other level's geometry with [`Geometry::decode_block`]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Geometry {
    block_offset_bits: u32,
    set_index_bits: u32,
    set_index_mask: u32,
}

impl Geometry {
    /// Creates the geometry for a level. Both arguments must be powers of two, which is checked
    /// when the configuration is validated rather than here
    ///
    /// # Arguments
    ///
    /// * `block_size`: The block size in bytes, shared by the hierarchy
    /// * `sets`: The number of sets in this level
    ///
    /// returns: Geometry
    pub fn new(block_size: u32, sets: u32) -> Self {
        debug_assert!(block_size.is_power_of_two() && sets.is_power_of_two());
        Self {
            block_offset_bits: block_size.trailing_zeros(),
            set_index_bits: sets.trailing_zeros(),
            set_index_mask: sets - 1,
        }
    }

    /// Converts an address into a set index and a tag
    ///
    /// # Examples
    ///
    /// ```
    /// use hierlib::address::Geometry;
    /// // 16 byte blocks, 4 sets
    /// let geometry = Geometry::new(16, 4);
    /// assert_eq!(geometry.decode(0x1234), (3, 0x48));
    /// ```
    #[inline]
    pub fn decode(&self, address: u32) -> (u32, u32) {
        self.decode_block(address >> self.block_offset_bits)
    }

    /// Same as [`Geometry::decode`], for an address with the block offset already removed
    #[inline]
    pub fn decode_block(&self, block: u32) -> (u32, u32) {
        (block & self.set_index_mask, block >> self.set_index_bits)
    }

    /// Rebuilds the block bits (the address shifted right by the block offset) from a set index
    /// and a tag decoded by this geometry
    #[inline]
    pub fn block_of(&self, set_index: u32, tag: u32) -> u32 {
        (tag << self.set_index_bits) | set_index
    }

    /// The number of sets this geometry indexes
    pub fn sets(&self) -> u32 {
        self.set_index_mask + 1
    }
}
