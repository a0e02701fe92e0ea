/// Builds a [`TransitionPath`](crate::TransitionPath) from mixed segments.
///
/// ```
/// use transitrx::path;
///
/// let path = path!["todo", 7, "toggle"];
/// assert_eq!(path.key(), "todo:7:toggle");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::TransitionPath::default()
    };

    ($($segment:expr),+ $(,)?) => {
        $crate::TransitionPath::from(
            ::std::vec![$(::std::string::ToString::to_string(&$segment)),+]
        )
    };
}
