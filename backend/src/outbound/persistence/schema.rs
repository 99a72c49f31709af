//! Diesel table definitions. Keep in step with `migrations/`.

diesel::table! {
    /// Contact records. Secondaries point at their primary via `linked_id`.
    contacts (id) {
        id -> Int4,
        phone_number -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        linked_id -> Nullable<Int4>,
        /// `primary` or `secondary`.
        #[max_length = 16]
        link_precedence -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}
