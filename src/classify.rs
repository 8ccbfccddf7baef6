use crate::profile::Lib;

/// How a matched absolute address is turned into the file-relative offset
/// that gets passed to the external resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetAdjustment {
    /// `address - lib.start + lib.offset`. The right form for ELF
    /// libraries on every target we've run this on.
    #[default]
    Plain,
    /// Clears the low bit and rewinds by one byte, for targets where
    /// symbol addresses carry a Thumb/ARM instruction-mode bit. Off by
    /// default; only enabled by an explicit flag.
    ThumbBit,
}

/// Returns the first library whose `start..end` range contains `address`.
/// Ranges are assumed disjoint, so list order only matters for malformed
/// input.
pub fn find_owning_lib(libs: &[Lib], address: u64) -> Option<&Lib> {
    libs.iter()
        .find(|lib| lib.start <= address && address < lib.end)
}

pub fn relative_offset(lib: &Lib, address: u64, adjustment: OffsetAdjustment) -> u64 {
    let offset = address - lib.start + lib.offset;
    match adjustment {
        OffsetAdjustment::Plain => offset,
        OffsetAdjustment::ThumbBit => (offset & !1).saturating_sub(1),
    }
}
