#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

#[macro_export]
macro_rules! pos {
    ($pat:literal) => {
        $crate::Matcher::Pos($crate::regex!($pat).clone())
    };
}

#[macro_export]
macro_rules! printname {
    ($pat:literal) => {
        $crate::Matcher::Printname($crate::regex!($pat).clone())
    };
}

#[macro_export]
macro_rules! append_rule {
    (
        name: $name:expr,
        modifier: $modifier:expr,
        head: $head:expr
        $(, partition: $partition:expr)?
        $(, head_first: $head_first:expr)?
        $(,)?
    ) => {{
        let direction = if false $(|| $head_first)? {
            $crate::AppendDirection::HeadFirst
        } else {
            $crate::AppendDirection::ModifierFirst
        };
        $crate::AppendConstruction::new($name, $modifier, $head, { 0 $(+ $partition)? }, direction)
    }};
}
