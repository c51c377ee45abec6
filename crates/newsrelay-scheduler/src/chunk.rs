//! Pagination of deliverable items into transport-sized messages.

use std::num::NonZeroUsize;

/// Split `items` into consecutive pages of at most `page_size`.
/// Empty input yields no pages.
pub fn chunk<T: Clone>(items: &[T], page_size: NonZeroUsize) -> Vec<Vec<T>> {
    items.chunks(page_size.get()).map(<[T]>::to_vec).collect()
}
