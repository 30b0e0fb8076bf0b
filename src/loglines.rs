/// The raw log as an immutable, ordered sequence of lines.
#[derive(Clone, Debug, Default)]
pub struct LogText {
    lines: Vec<String>,
}

impl LogText {
    pub fn new(contents: &str) -> Self {
        LogText { lines: contents.lines().map(|l| l.to_string()).collect() }
    }

    pub fn lines(&self) -> &[String] { &self.lines }

    pub fn len(&self) -> usize { self.lines.len() }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn get(&self, idx: usize) -> Option<&str> { self.lines.get(idx).map(|s| s.as_str()) }

    /// All lines containing `term`, in log order.
    pub fn search<'a>(&'a self, term: &str) -> Vec<&'a str> {
        self.lines.iter().filter(|l| l.contains(term)).map(|l| l.as_str()).collect()
    }

    pub fn search_with_index<'a>(&'a self, term: &str) -> Vec<(usize, &'a str)> {
        self.lines.iter().enumerate().filter(|(_, l)| l.contains(term)).map(|(i, l)| (i, l.as_str())).collect()
    }

    pub fn first(&self, term: &str) -> Option<&str> {
        self.lines.iter().find(|l| l.contains(term)).map(|l| l.as_str())
    }

    pub fn contains(&self, term: &str) -> bool { self.lines.iter().any(|l| l.contains(term)) }
}

impl From<&str> for LogText {
    fn from(s: &str) -> Self { LogText::new(s) }
}
