
use crate::coord::NUM_LTIS;
use std::{
    ops::{
        Index,
        IndexMut,
    },
    iter::{
        repeat,
        FromIterator,
    },
    slice,
};


/// Per-tile (within a chunk) storage of `T` via an array.
///
/// Implements `FromIterator`, as well as `Index`/`IndexMut<u8>`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PerTile<T>(pub Box<[T; NUM_LTIS]>);

impl<T> PerTile<T> {
    /// Construct with one clone of `val` per tile.
    pub fn repeat(val: T) -> Self
    where
        T: Clone,
    {
        repeat(val).take(NUM_LTIS).collect()
    }

    /// Iterate over (lti, &val) pairs.
    pub fn iter(&self) -> impl Iterator<Item=(u8, &T)> + '_ {
        self.0.iter().enumerate().map(|(i, val)| (i as u8, val))
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.0.iter_mut()
    }
}

impl<T: Default> Default for PerTile<T> {
    fn default() -> Self {
        (0..NUM_LTIS).map(|_| T::default()).collect()
    }
}

/// Panics if iterator contains too many or too few items.
impl<T> FromIterator<T> for PerTile<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item=T>,
    {
        let vec = iter.into_iter().collect::<Vec<T>>();
        assert_eq!(vec.len(), NUM_LTIS, "wrong number of items in iter");
        match vec.into_boxed_slice().try_into() {
            Ok(array) => PerTile(array),
            Err(_) => unreachable!(),
        }
    }
}

impl<T> Index<u8> for PerTile<T> {
    type Output = T;

    fn index(&self, i: u8) -> &T {
        &self.0[i as usize]
    }
}

impl<T> IndexMut<u8> for PerTile<T> {
    fn index_mut(&mut self, i: u8) -> &mut T {
        &mut self.0[i as usize]
    }
}
