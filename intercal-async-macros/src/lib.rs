use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Marks an `async fn` as a test that runs on both targets.
///
/// - native: a plain `#[test]` whose body is driven by
///   `intercal_async::runtime::block_on`, so `spawn_local` is available;
/// - wasm32: the async fn is handed to `wasm_bindgen_test` unchanged.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let tokens = TokenStream2::from(attr);
        return syn::Error::new_spanned(tokens, "intercal_async::test does not accept arguments")
            .to_compile_error()
            .into();
    }

    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            input.sig.fn_token,
            "intercal_async::test requires an `async fn`",
        )
        .to_compile_error()
        .into();
    }

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    let mut native_sig = sig.clone();
    native_sig.asyncness = None;

    let expanded = quote! {
        #[cfg(not(target_arch = "wasm32"))]
        #(#attrs)*
        #[test]
        #vis #native_sig {
            intercal_async::runtime::block_on(async move #block)
        }

        #[cfg(target_arch = "wasm32")]
        #(#attrs)*
        #[intercal_async::test_support::wasm_bindgen_test]
        #vis #sig #block
    };

    expanded.into()
}
