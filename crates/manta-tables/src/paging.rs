//! Page handlers for scans.

use async_trait::async_trait;

use crate::error::TableError;

/// Whether a scan should keep advancing after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFlow {
    Continue,
    Stop,
}

/// Receives each page of a scan, along with the resume token that produced
/// the page and the token for the page after it. Returning
/// [`ScanFlow::Stop`] ends the scan; the caller can persist
/// `next_page_state` and resume later via query options.
#[async_trait]
pub trait PageHandler<T>: Send {
    async fn on_page(
        &mut self,
        records: Vec<T>,
        page_state: Option<&[u8]>,
        next_page_state: Option<&[u8]>,
    ) -> Result<ScanFlow, TableError>;
}

/// Adapts a plain closure into a [`PageHandler`].
pub struct PageFn<F>(pub F);

#[async_trait]
impl<T, F> PageHandler<T> for PageFn<F>
where
    T: Send + 'static,
    F: FnMut(Vec<T>, Option<&[u8]>, Option<&[u8]>) -> Result<ScanFlow, TableError> + Send,
{
    async fn on_page(
        &mut self,
        records: Vec<T>,
        page_state: Option<&[u8]>,
        next_page_state: Option<&[u8]>,
    ) -> Result<ScanFlow, TableError> {
        (self.0)(records, page_state, next_page_state)
    }
}

/// A handler that keeps requesting pages and accumulates every record.
#[derive(Debug)]
pub struct GreedyScanner<T> {
    items: Vec<T>,
}

impl<T> GreedyScanner<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Pre-allocates the accumulator.
    pub fn preallocate(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// The accumulated records.
    pub fn into_result(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for GreedyScanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> PageHandler<T> for GreedyScanner<T> {
    async fn on_page(
        &mut self,
        records: Vec<T>,
        _page_state: Option<&[u8]>,
        _next_page_state: Option<&[u8]>,
    ) -> Result<ScanFlow, TableError> {
        self.items.extend(records);
        Ok(ScanFlow::Continue)
    }
}

/// A handler that reads a single page and stops.
#[derive(Debug)]
pub struct SinglePageScanner<T> {
    items: Vec<T>,
    next_page_state: Option<Vec<u8>>,
}

impl<T> SinglePageScanner<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_page_state: None,
        }
    }

    /// The page's records plus the token to resume from.
    pub fn into_result(self) -> (Vec<T>, Option<Vec<u8>>) {
        (self.items, self.next_page_state)
    }
}

impl<T> Default for SinglePageScanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> PageHandler<T> for SinglePageScanner<T> {
    async fn on_page(
        &mut self,
        records: Vec<T>,
        _page_state: Option<&[u8]>,
        next_page_state: Option<&[u8]>,
    ) -> Result<ScanFlow, TableError> {
        self.items.extend(records);
        self.next_page_state = next_page_state.map(|s| s.to_vec());
        Ok(ScanFlow::Stop)
    }
}
