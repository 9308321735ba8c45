// Table sorting shared by every report view.
//
// A table keeps one `SortState`. Clicking a column goes through
// `SortState::toggle`, then the rows are re-sorted with `sort_rows` and
// re-ranked with `assign_ranks`.
use std::cmp::Ordering;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortKind {
    Numeric,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    /// Header marker: ` ▲` ascending, ` ▼` descending.
    pub fn indicator(self) -> &'static str {
        match self {
            Direction::Ascending => " ▲",
            Direction::Descending => " ▼",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub key: String,
    pub direction: Direction,
    pub kind: SortKind,
}

impl SortState {
    pub fn new(key: &str, direction: Direction, kind: SortKind) -> Self {
        Self {
            key: key.to_string(),
            direction,
            kind,
        }
    }

    pub fn descending(key: &str, kind: SortKind) -> Self {
        Self::new(key, Direction::Descending, kind)
    }

    /// Column click. The active key flips direction; any other key becomes
    /// active in descending order. The kind always follows the clicked column.
    pub fn toggle(&mut self, key: &str, kind: SortKind) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key.to_string();
            self.direction = Direction::Descending;
        }
        self.kind = kind;
    }
}

/// A cell value as seen by the comparator.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Number(f64),
    Text(String),
    Missing,
}

impl SortValue {
    /// Numeric coercion: text that does not parse and missing values are 0.
    pub fn as_number(&self) -> f64 {
        match self {
            SortValue::Number(n) if n.is_finite() => *n,
            SortValue::Number(_) => 0.0,
            SortValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
            SortValue::Missing => 0.0,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            SortValue::Number(n) => n.to_string(),
            SortValue::Text(s) => s.clone(),
            SortValue::Missing => String::new(),
        }
    }
}

impl From<i64> for SortValue {
    fn from(v: i64) -> Self {
        SortValue::Number(v as f64)
    }
}

impl From<usize> for SortValue {
    fn from(v: usize) -> Self {
        SortValue::Number(v as f64)
    }
}

impl From<&String> for SortValue {
    fn from(v: &String) -> Self {
        SortValue::Text(v.clone())
    }
}

impl From<&str> for SortValue {
    fn from(v: &str) -> Self {
        SortValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Column definition handed to whatever renders the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: SortKind,
    pub align: Align,
}

impl Column {
    pub const fn new(key: &'static str, label: &'static str, kind: SortKind, align: Align) -> Self {
        Self {
            key,
            label,
            kind,
            align,
        }
    }
}

/// A row of a sortable report table.
pub trait TableRow {
    fn columns() -> &'static [Column];

    fn sort_value(&self, key: &str) -> SortValue;

    /// Rows without a rank column ignore this.
    fn set_rank(&mut self, _rank: usize) {}

    fn column(key: &str) -> Option<&'static Column> {
        Self::columns().iter().find(|c| c.key == key)
    }
}

/// Compare two values under `kind`, ascending.
pub fn compare_values(a: &SortValue, b: &SortValue, kind: SortKind) -> Ordering {
    match kind {
        SortKind::Numeric => a
            .as_number()
            .partial_cmp(&b.as_number())
            .unwrap_or(Ordering::Equal),
        SortKind::String => collate(&a.as_text(), &b.as_text()),
    }
}

/// Stable sort by `state`. Equal keys keep their incoming order.
pub fn sort_rows<T: TableRow>(rows: &mut [T], state: &SortState) {
    rows.sort_by(|a, b| {
        let ord = compare_values(&a.sort_value(&state.key), &b.sort_value(&state.key), state.kind);
        match state.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
}

/// Ranks are positions after sorting; ties get consecutive ranks.
pub fn assign_ranks<T: TableRow>(rows: &mut [T]) {
    for (idx, row) in rows.iter_mut().enumerate() {
        row.set_rank(idx + 1);
    }
}

/// Sort then rank, the sequence every ranked table goes through.
pub fn sort_and_rank<T: TableRow>(rows: &mut [T], state: &SortState) {
    sort_rows(rows, state);
    assign_ranks(rows);
}

/// Korean-locale string comparison.
///
/// Characters are compared by script class first (spaces and punctuation,
/// digits, Hangul, Han, then Latin and everything else), then case-
/// insensitively within the class. Hangul syllables and compatibility jamo
/// are laid out in dictionary order in Unicode, so their code points order
/// them correctly. Remaining ties put lowercase first, then fall back to code
/// point order so the result is total.
pub fn collate(a: &str, b: &str) -> Ordering {
    let primary = a
        .chars()
        .map(collation_key)
        .cmp(b.chars().map(collation_key));
    primary.then_with(|| {
        a.chars()
            .map(|c| (c.is_uppercase(), c))
            .cmp(b.chars().map(|c| (c.is_uppercase(), c)))
    })
}

fn collation_key(c: char) -> (u8, u32) {
    let class = if c.is_whitespace() || c.is_ascii_punctuation() {
        0
    } else if c.is_ascii_digit() {
        1
    } else if is_hangul(c) {
        2
    } else if is_han(c) {
        3
    } else {
        4
    };
    let folded = c.to_lowercase().next().unwrap_or(c);
    (class, folded as u32)
}

fn is_hangul(c: char) -> bool {
    matches!(c,
        '\u{AC00}'..='\u{D7A3}'
        | '\u{1100}'..='\u{11FF}'
        | '\u{3130}'..='\u{318F}')
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        rank: usize,
        name: &'static str,
        amount: i64,
    }

    impl TableRow for Row {
        fn columns() -> &'static [Column] {
            const COLUMNS: &[Column] = &[
                Column::new("rank", "순위", SortKind::Numeric, Align::Center),
                Column::new("name", "이름", SortKind::String, Align::Left),
                Column::new("amount", "금액", SortKind::Numeric, Align::Right),
            ];
            COLUMNS
        }

        fn sort_value(&self, key: &str) -> SortValue {
            match key {
                "rank" => SortValue::from(self.rank),
                "name" => SortValue::from(self.name),
                "amount" => SortValue::from(self.amount),
                _ => SortValue::Missing,
            }
        }

        fn set_rank(&mut self, rank: usize) {
            self.rank = rank;
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { rank: 0, name: "나", amount: 50 },
            Row { rank: 0, name: "가", amount: 100 },
            Row { rank: 0, name: "다", amount: 50 },
        ]
    }

    #[test]
    fn toggle_same_key_flips_direction() {
        let mut state = SortState::descending("amount", SortKind::Numeric);
        state.toggle("amount", SortKind::Numeric);
        assert_eq!(state.direction, Direction::Ascending);
        state.toggle("amount", SortKind::Numeric);
        assert_eq!(state.direction, Direction::Descending);
    }

    #[test]
    fn toggle_new_key_defaults_to_descending() {
        let mut state = SortState::descending("amount", SortKind::Numeric);
        state.toggle("amount", SortKind::Numeric);
        assert_eq!(state.direction, Direction::Ascending);
        state.toggle("date", SortKind::String);
        assert_eq!(state.key, "date");
        assert_eq!(state.direction, Direction::Descending);
        assert_eq!(state.kind, SortKind::String);
    }

    #[test]
    fn descending_numeric_keeps_ties_in_input_order() {
        let mut data = rows();
        sort_and_rank(&mut data, &SortState::descending("amount", SortKind::Numeric));
        let names: Vec<_> = data.iter().map(|r| r.name).collect();
        assert_eq!(names, ["가", "나", "다"]);
        let ranks: Vec<_> = data.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn ascending_string_uses_hangul_order() {
        let mut data = rows();
        sort_rows(&mut data, &SortState::new("name", Direction::Ascending, SortKind::String));
        let names: Vec<_> = data.iter().map(|r| r.name).collect();
        assert_eq!(names, ["가", "나", "다"]);
    }

    #[test]
    fn unknown_key_sorts_as_zero_and_preserves_order() {
        let mut data = rows();
        sort_rows(&mut data, &SortState::descending("nope", SortKind::Numeric));
        let names: Vec<_> = data.iter().map(|r| r.name).collect();
        assert_eq!(names, ["나", "가", "다"]);
    }

    #[test]
    fn numeric_coercion_of_text() {
        assert_eq!(SortValue::Text("12.5".into()).as_number(), 12.5);
        assert_eq!(SortValue::Text("abc".into()).as_number(), 0.0);
        assert_eq!(SortValue::Number(f64::NAN).as_number(), 0.0);
        assert_eq!(SortValue::Missing.as_number(), 0.0);
    }

    #[test]
    fn collation_classes_and_case() {
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("10", "가"), Ordering::Less);
        assert_eq!(collate("가나", "Apple"), Ordering::Less);
        assert_eq!(collate("서울", "부산"), Ordering::Greater);
        assert_eq!(collate("a", "A"), Ordering::Less);
        assert_eq!(collate("same", "same"), Ordering::Equal);
        // punctuation, digits, Hangul, Han, Latin
        let mut words = vec!["apple", "漢字", "가나", "7번", "-끝"];
        words.sort_by(|a, b| collate(a, b));
        assert_eq!(words, ["-끝", "7번", "가나", "漢字", "apple"]);
    }
}
