mod record;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

// ============================================================================
// #[derive(Record)]
// ============================================================================

/// Derive macro that implements `library_sync::Record` for a stored entity.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[serde(rename_all = "camelCase")]
/// #[record(collection = "books")]
/// pub struct Book {
///     #[record(id)]
///     pub id: String,
///     pub title: String,
///     #[record(created)]
///     pub added_at: Timestamp,
/// }
/// ```
///
/// - `collection` defaults to the snake_case struct name plus `s`.
/// - The id field defaults to a field named `id`.
/// - The `created` field is required; its camelCase name is the field the
///   backend orders by (`added_at` becomes `"addedAt"`).
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::derive_record(&input).into()
}
