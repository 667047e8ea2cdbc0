#[derive(Debug, Clone, PartialEq)]
pub enum PieToken {
    Header { show_data: bool, title: Option<String> },
    ShowData,
    Title(String),
    Slice { label: String, value: f64 },
}
