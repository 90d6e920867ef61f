use std::fmt;

/// Layouts that wrap their body into chunks to fit a terminal.
pub trait Width {
    fn width_by_chunk_size(chunk_size: usize) -> usize;
    fn chunk_size(max_width: usize) -> usize {
        let mut chunk_size = 1;
        while Self::width_by_chunk_size(chunk_size + 1) <= max_width {
            chunk_size += 1;
        }
        chunk_size
    }
}

pub trait Stat {
    fn view(&self, max_width: usize) -> Box<dyn StatView + '_>;
}

pub trait StatView: fmt::Display {
    /// header of stat
    fn header(&self) -> &'static str;
    /// body width
    fn width(&self) -> usize;
}

pub trait AddStats {
    /// add stat to `buf`.
    fn add_stats(&self, buf: &mut Stats);
}

#[derive(Default)]
pub struct Stats {
    stats: Vec<Box<dyn Stat>>,
}

impl Stats {
    pub fn push(&mut self, stat: Box<dyn Stat>) {
        self.stats.push(stat)
    }
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
    pub fn view(&self, max_width: usize) -> StatAllView<'_> {
        StatAllView {
            views: self.stats.iter().map(|s| s.view(max_width)).collect(),
        }
    }
}

impl Extend<Box<dyn Stat>> for Stats {
    fn extend<T: IntoIterator<Item = Box<dyn Stat>>>(&mut self, iter: T) {
        self.stats.extend(iter)
    }
}

pub struct StatAllView<'s> {
    views: Vec<Box<dyn StatView + 's>>,
}

impl fmt::Display for StatAllView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .views
            .iter()
            .map(|s| s.header().len().max(s.width()))
            .max()
            .unwrap_or(40);
        writeln!(f, "{:-^width$}", " statistics ")?;
        for sv in &self.views {
            writeln!(f, "{}:", sv.header())?;
            writeln!(f, "{}", sv)?;
        }
        write!(f, "{:-<width$}", "")
    }
}

/// `hits / total`, printed as a fraction in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ratio {
    pub hits: usize,
    pub total: usize,
}

impl Ratio {
    pub fn new(hits: usize, total: usize) -> Self {
        Self { hits, total }
    }
    pub fn value(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}", p, self.value()),
            None => write!(f, "{:.4}", self.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Width for Fixed {
        fn width_by_chunk_size(chunk_size: usize) -> usize {
            chunk_size * 10
        }
    }

    struct Dummy;

    impl Stat for Dummy {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(DummyView)
        }
    }

    struct DummyView;

    impl StatView for DummyView {
        fn header(&self) -> &'static str {
            "dummy"
        }
        fn width(&self) -> usize {
            20
        }
    }

    impl fmt::Display for DummyView {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "  body")
        }
    }

    #[test]
    fn test_chunk_size() {
        assert_eq!(Fixed::chunk_size(35), 3);
        assert_eq!(Fixed::chunk_size(40), 4);
        assert_eq!(Fixed::chunk_size(5), 1);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(format!("{}", Ratio::new(1, 4)), "0.2500");
        assert_eq!(format!("{:.1}", Ratio::new(1, 3)), "0.3");
        assert_eq!(Ratio::new(0, 0).value(), 0.0);
    }

    #[test]
    fn test_all_view() {
        let mut stats = Stats::default();
        assert!(stats.is_empty());
        stats.push(Box::new(Dummy));
        let s = format!("{}", stats.view(80));
        assert_eq!(
            s,
            format!("{:-^20}\ndummy:\n  body\n{:-<20}", " statistics ", "")
        );
    }
}
