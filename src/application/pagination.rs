//! Page-number pagination over ordered listings.

use thiserror::Error;

use crate::application::repos::Slice;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageNumberError {
    #[error("page number `{0}` is not an integer")]
    NotAnInteger(String),
    #[error("page {requested} is out of range (1..={num_pages})")]
    Empty { requested: i64, num_pages: u64 },
}

/// Splits `count` items into pages of `per_page`. An empty listing still has one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: u64,
    per_page: u64,
}

impl Paginator {
    pub fn new(count: u64, per_page: u64) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn num_pages(&self) -> u64 {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    /// Validate a raw `page` query value.
    pub fn page(&self, raw: &str) -> Result<PageWindow, PageNumberError> {
        let number = parse_page_number(raw)?;
        let num_pages = self.num_pages();
        if number < 1 || number as u64 > num_pages {
            return Err(PageNumberError::Empty {
                requested: number,
                num_pages,
            });
        }
        Ok(self.window(number as u64))
    }

    /// Resolve the requested page, falling back to the first page for
    /// non-integers and to the last page for out-of-range numbers.
    pub fn resolve(&self, raw: Option<&str>) -> PageWindow {
        match raw.map(|value| self.page(value)) {
            None => self.window(1),
            Some(Ok(window)) => window,
            Some(Err(PageNumberError::NotAnInteger(_))) => self.window(1),
            Some(Err(PageNumberError::Empty { num_pages, .. })) => self.window(num_pages),
        }
    }

    fn window(&self, number: u64) -> PageWindow {
        PageWindow {
            number,
            num_pages: self.num_pages(),
            per_page: self.per_page,
            count: self.count,
        }
    }
}

fn parse_page_number(raw: &str) -> Result<i64, PageNumberError> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'+') => (false, &trimmed[1..]),
        Some(b'-') => (true, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(PageNumberError::NotAnInteger(raw.to_string()));
    }
    // Only overflow can fail here; it is still an integer, just out of range.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Ok(if negative { -magnitude } else { magnitude })
}

/// One resolved page of a [`Paginator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    number: u64,
    num_pages: u64,
    per_page: u64,
    count: u64,
}

impl PageWindow {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn num_pages(&self) -> u64 {
        self.num_pages
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn slice(&self) -> Slice {
        Slice {
            offset: (self.number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    /// 1-based index of the first item on the page; 0 for an empty listing.
    pub fn start_index(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.slice().offset + 1
        }
    }

    pub fn end_index(&self) -> u64 {
        (self.slice().offset + self.per_page).min(self.count)
    }
}
