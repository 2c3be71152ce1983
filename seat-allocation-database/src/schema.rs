diesel::table! {
    students (identity) {
        identity -> Text,
        score -> Int8,
        preferences -> Array<Text>,
        admitted -> Nullable<Text>,
        submitted_at -> Int8,
    }
}
