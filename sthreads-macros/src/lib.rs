mod args;
use args::RuntimeArgs;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Error, ItemFn, parse_macro_input};

/// Runs `fn main` as the bootstrap thread of an sthreads runtime.
///
/// Accepts `preempt_ms = N` to enable preemption every `N` milliseconds
/// and `stack_size = N` to set the stack size of spawned threads.
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RuntimeArgs);
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.ident != "main" {
        return Error::new_spanned(&input.sig.ident, "#[sthreads::main] must be used on fn main")
            .to_compile_error()
            .into();
    }

    expand(&args, input, None)
}

/// Like `#[test]`, with the test body running as the bootstrap thread of
/// a fresh runtime.
///
/// Accepts the same arguments as `#[sthreads::main]`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RuntimeArgs);
    let input = parse_macro_input!(item as ItemFn);

    expand(&args, input, Some(quote! { #[::core::prelude::v1::test] }))
}

fn expand(
    args: &RuntimeArgs,
    input: ItemFn,
    marker: Option<proc_macro2::TokenStream>,
) -> TokenStream {
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;

    if let Some(asyncness) = &sig.asyncness {
        return Error::new_spanned(asyncness, "sthreads runs plain functions, not async ones")
            .to_compile_error()
            .into();
    }

    let init = args.init_expr();

    quote! {
        #marker
        #(#attrs)*
        #vis #sig {
            let _runtime = #init.expect("failed to start sthreads runtime");
            #block
        }
    }
    .into()
}
