use std::fmt::Debug;
use std::marker::PhantomData;

pub trait IIndex {
    fn index(&self) -> usize;
    fn from_index(index: usize) -> Self;
    fn string_name() -> &'static str;
}

/// Hands out indices of one kind, each exactly once, in increasing order.
pub struct ISource<I: IIndex>(usize, PhantomData<I>);

#[macro_export]
macro_rules! create_index {
    ($name:ident) => {
        create_index!(@module $name);
        paste!(use [<__id_ $name:snake>]::$name;);
    };

    (pub $name:ident) => {
        create_index!(@module $name);
        paste!(pub use [<__id_ $name:snake>]::$name;);
    };

    (@module $name:ident) => {
        paste! {
            mod [<__id_ $name:snake>] {
                #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
                pub struct $name(usize);

                impl $crate::ivec::IIndex for $name {
                    fn index(&self) -> usize {
                        self.0
                    }

                    fn from_index(index: usize) -> Self {
                        Self(index)
                    }

                    fn string_name() -> &'static str {
                        stringify!($name)
                    }
                }
            }
        }
    };
}

impl<I: IIndex> ISource<I> {
    pub fn new() -> Self {
        Self(0, PhantomData)
    }

    pub fn next(&mut self) -> I {
        let index = self.0;
        self.0 += 1;
        I::from_index(index)
    }

    /// Number of indices handed out so far.
    pub fn len(&self) -> usize {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl<I: IIndex> Default for ISource<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: IIndex> Debug for ISource<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ISource<{}>({})", I::string_name(), self.0)
    }
}
