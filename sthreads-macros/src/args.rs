use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Expr, ExprLit, Lit, LitInt, MetaNameValue, Result, Token};

/// Arguments accepted by `#[sthreads::main]` and `#[sthreads::test]`.
///
/// ```text
/// #[sthreads::main(preempt_ms = 10, stack_size = 65536)]
/// ```
#[derive(Default)]
pub(crate) struct RuntimeArgs {
    pub(crate) preempt_ms: Option<LitInt>,
    pub(crate) stack_size: Option<LitInt>,
}

impl Parse for RuntimeArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = RuntimeArgs::default();
        let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated(input)?;

        for pair in pairs {
            let value = int_value(&pair)?;

            let slot = if pair.path.is_ident("preempt_ms") {
                &mut args.preempt_ms
            } else if pair.path.is_ident("stack_size") {
                &mut args.stack_size
            } else {
                return Err(Error::new_spanned(
                    &pair.path,
                    "unknown argument, expected `preempt_ms` or `stack_size`",
                ));
            };

            if slot.is_some() {
                return Err(Error::new_spanned(&pair.path, "duplicate argument"));
            }
            *slot = Some(value);
        }

        Ok(args)
    }
}

impl RuntimeArgs {
    /// Expression building the runtime, typed `sthreads::Result<Runtime>`.
    pub(crate) fn init_expr(&self) -> TokenStream {
        let preemption = self.preempt_ms.as_ref().map(|ms| {
            quote! { .preemption(::std::time::Duration::from_millis(#ms)) }
        });
        let stack_size = self.stack_size.as_ref().map(|bytes| {
            quote! { .stack_size(#bytes) }
        });

        quote! {
            ::sthreads::RuntimeBuilder::new()
                #preemption
                #stack_size
                .init()
        }
    }
}

fn int_value(pair: &MetaNameValue) -> Result<LitInt> {
    match &pair.value {
        Expr::Lit(ExprLit {
            lit: Lit::Int(int), ..
        }) => {
            if int.base10_parse::<u64>()? == 0 {
                return Err(Error::new_spanned(int, "value must be greater than zero"));
            }
            Ok(int.clone())
        }
        other => Err(Error::new_spanned(other, "expected an integer literal")),
    }
}
