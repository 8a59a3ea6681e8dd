//! Macros for inject-rs. `#[derive(Injectable)]` writes the constructor and member tables,
//! `#[injectable]` adds constructors and setters from an impl block, `#[module]` turns
//! `#[provides]` methods into providers.

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::quote;
use syn::parse::Parse;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, FnArg, GenericArgument, ImplItem,
    ItemImpl, LitStr, Meta, Path, PathArguments, ReturnType, Signature, Token, Type,
};

/// Name and qualifiers attached to a field, parameter or provider.
#[derive(Default)]
struct Annotations {
    named: Option<LitStr>,
    qualified: Vec<Path>,
}

impl Annotations {
    fn param(&self, ty: &Type) -> TokenStream2 {
        let mut tokens = quote!(::inject_rs::Param::of::<#ty>());
        if let Some(name) = &self.named {
            tokens = quote!(#tokens.named(#name));
        }
        for qualifier in &self.qualified {
            tokens = quote!(#tokens.qualified::<#qualifier>());
        }
        tokens
    }
}

/// Removes `#[named("..")]` and `#[qualified(Marker)]` from `attrs`.
fn take_annotations(attrs: &mut Vec<Attribute>) -> syn::Result<Annotations> {
    let mut annotations = Annotations::default();
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if attr.path().is_ident("named") {
            annotations.named = Some(attr.parse_args()?);
        } else if attr.path().is_ident("qualified") {
            annotations.qualified.push(attr.parse_args()?);
        } else {
            kept.push(attr);
        }
    }
    *attrs = kept;
    Ok(annotations)
}

/// Removes a bare `#[name]` attribute, reporting whether it was there.
fn take_flag(attrs: &mut Vec<Attribute>, name: &str) -> bool {
    let before = attrs.len();
    attrs.retain(|attr| !attr.path().is_ident(name));
    attrs.len() != before
}

/// `T` in `Wrapper<T>`, matched on the last path segment.
fn inner_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Lookup type and value expression for a parameter declared as `ty`.
fn extract<'a>(ty: &'a Type, cursor: &Ident) -> (&'a Type, TokenStream2) {
    if let Some(shared) = inner_type(ty, "Option").and_then(|t| inner_type(t, "Arc")) {
        return (shared, quote!(#cursor.next_opt::<#shared>()?));
    }
    if let Some(shared) = inner_type(ty, "Arc") {
        return (shared, quote!(#cursor.next::<#shared>()?));
    }
    (ty, quote!(#cursor.value::<#ty>()?))
}

fn cursor(used: bool) -> Ident {
    let name = if used { "params" } else { "_params" };
    Ident::new(name, Span::call_site())
}

fn returns_result(output: &ReturnType) -> bool {
    matches!(output, ReturnType::Type(_, ty) if inner_type(ty, "Result").is_some())
}

/// Strips parameter annotations and returns `(param descriptors, argument expressions)`.
fn signature_params(
    sig: &mut Signature,
    cursor: &Ident,
) -> syn::Result<(Vec<TokenStream2>, Vec<TokenStream2>)> {
    let mut params = Vec::new();
    let mut args = Vec::new();
    for input in sig.inputs.iter_mut() {
        let FnArg::Typed(typed) = input else {
            continue;
        };
        let annotations = take_annotations(&mut typed.attrs)?;
        let (key, expr) = extract(&typed.ty, cursor);
        params.push(annotations.param(key));
        args.push(expr);
    }
    Ok((params, args))
}

fn typed_arg_count(sig: &Signature) -> usize {
    sig.inputs
        .iter()
        .filter(|input| matches!(input, FnArg::Typed(_)))
        .count()
}

#[derive(Default)]
struct TypeOptions {
    singleton: bool,
    constructors: bool,
    methods: bool,
    implements: Vec<Type>,
}

fn type_options(attrs: &[Attribute]) -> syn::Result<TypeOptions> {
    let mut options = TypeOptions::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("singleton") {
                options.singleton = true;
            } else if meta.path.is_ident("constructors") {
                options.constructors = true;
            } else if meta.path.is_ident("methods") {
                options.methods = true;
            } else if meta.path.is_ident("implements") {
                let content;
                syn::parenthesized!(content in meta.input);
                options
                    .implements
                    .extend(content.parse_terminated(Type::parse, Token![,])?);
            } else {
                return Err(meta.error("expected singleton, constructors, methods or implements(..)"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

#[derive(Default)]
struct FieldOptions {
    inject: bool,
    annotations: Annotations,
}

fn field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        options.inject = true;
        if let Meta::Path(_) = attr.meta {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("named") {
                options.annotations.named = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("qualified") {
                options.annotations.qualified.push(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected named = \"..\" or qualified = Marker"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

/// Implements `Injectable`.
///
/// - `#[inject(singleton)]` declares the type singleton.
/// - `#[inject(implements(dyn Trait, ..))]` lets the type be bound to those views.
/// - `#[inject(constructors)]` / `#[inject(methods)]` take constructors / setters from an
///   `#[injectable]` impl block.
/// - `#[inject]` on a `Slot<T>` field injects it after construction; on any other field it
///   becomes a parameter of the generated constructor (`Arc<T>`, `Option<Arc<T>>` or a
///   cloned value). Fields without `#[inject]` start from `Default`.
/// - `#[inject(named = "..", qualified = Marker)]` narrows the binding.
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_injectable(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_injectable(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let options = type_options(&input.attrs)?;
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Injectable can only be derived for structs",
        ));
    };

    let mut inits = Vec::new();
    let mut ctor_params = Vec::new();
    let mut members = Vec::new();
    let params = Ident::new("params", Span::call_site());
    match &data.fields {
        Fields::Named(fields) => {
            for field in &fields.named {
                let Some(ident) = field.ident.as_ref() else {
                    continue;
                };
                let field_opts = field_options(&field.attrs)?;
                if !field_opts.inject {
                    inits.push(quote!(#ident: ::std::default::Default::default()));
                    continue;
                }
                if let Some(inner) = inner_type(&field.ty, "Slot") {
                    let param = field_opts.annotations.param(inner);
                    let member = ident.to_string();
                    members.push(quote! {
                        ::inject_rs::Member::<Self>::field(#member, #param, |this, params| {
                            this.#ident.set(params.next::<#inner>()?);
                            ::std::result::Result::Ok(())
                        })
                    });
                    inits.push(quote!(#ident: ::std::default::Default::default()));
                } else {
                    let (key, expr) = extract(&field.ty, &params);
                    ctor_params.push(field_opts.annotations.param(key));
                    inits.push(quote!(#ident: #expr));
                }
            }
        }
        Fields::Unit => {}
        Fields::Unnamed(fields) => {
            return Err(syn::Error::new_spanned(
                fields,
                "Injectable needs named fields or a unit struct",
            ));
        }
    }

    let constructors = if options.constructors {
        quote!(<Self as ::inject_rs::InjectConstructors>::constructors())
    } else {
        let build = match &data.fields {
            Fields::Unit => quote!(Self),
            _ => quote!(Self { #(#inits),* }),
        };
        let cursor = cursor(!ctor_params.is_empty());
        let ctor = if ctor_params.is_empty() {
            quote!(::inject_rs::Constructor::<Self>::new)
        } else {
            quote!(::inject_rs::Constructor::<Self>::injected)
        };
        quote! {
            ::std::vec![
                #ctor(|#cursor| ::std::result::Result::Ok(#build)) #(.param(#ctor_params))*
            ]
        }
    };

    let methods = if options.methods {
        quote!(members.extend(<Self as ::inject_rs::InjectMethods>::methods());)
    } else {
        quote!()
    };

    let singleton = options.singleton;
    let implements = options.implements.iter().map(|view| {
        quote! {
            impl #impl_generics ::inject_rs::Implements<#view> for #name #ty_generics #where_clause {
                fn upcast(this: ::std::sync::Arc<Self>) -> ::std::sync::Arc<#view> {
                    this
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::inject_rs::Injectable for #name #ty_generics #where_clause {
            const SINGLETON: bool = #singleton;

            fn constructors() -> ::std::vec::Vec<::inject_rs::Constructor<Self>> {
                #constructors
            }

            fn members() -> ::std::vec::Vec<::inject_rs::Member<Self>> {
                #[allow(unused_mut)]
                let mut members: ::std::vec::Vec<::inject_rs::Member<Self>> = ::std::vec![#(#members),*];
                #methods
                members
            }
        }

        #(#implements)*
    })
}

/// Collects constructors and setters from an impl block.
///
/// `#[inject]` on an associated function returning `Self` (or `Result<Self, E>`) makes an
/// injected constructor; `#[constructor]` makes one that only takes explicit arguments.
/// `#[inject]` on a `&self` method makes a setter. Parameters accept `#[named("..")]` and
/// `#[qualified(Marker)]`. Pair with `#[derive(Injectable)] #[inject(constructors, methods)]`.
#[proc_macro_attribute]
pub fn injectable(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(Span::call_site(), "#[injectable] takes no arguments")
            .into_compile_error()
            .into();
    }
    let item = parse_macro_input!(input as ItemImpl);
    expand_injectable_impl(item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_injectable_impl(mut item: ItemImpl) -> syn::Result<TokenStream2> {
    let self_ty = item.self_ty.clone();
    let generics = item.generics.clone();
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    let mut constructors = Vec::new();
    let mut methods = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let inject = take_flag(&mut method.attrs, "inject");
        let explicit = take_flag(&mut method.attrs, "constructor");
        if !inject && !explicit {
            continue;
        }
        let ident = method.sig.ident.clone();
        let cursor = cursor(typed_arg_count(&method.sig) > 0);
        let fallible = returns_result(&method.sig.output);
        let receiver = method.sig.receiver().is_some();
        let (params, args) = signature_params(&mut method.sig, &cursor)?;

        if receiver {
            if explicit {
                return Err(syn::Error::new_spanned(
                    &method.sig,
                    "#[constructor] goes on an associated function returning Self",
                ));
            }
            let call = quote!(this.#ident(#(#args),*));
            let body = if fallible {
                quote!(#call.map_err(::std::convert::Into::into))
            } else {
                quote!({
                    #call;
                    ::std::result::Result::Ok(())
                })
            };
            let member = ident.to_string();
            methods.push(quote! {
                ::inject_rs::Member::<Self>::method(#member, |this, #cursor| #body) #(.param(#params))*
            });
        } else {
            let call = quote!(Self::#ident(#(#args),*));
            let body = if fallible {
                quote!(#call.map_err(::std::convert::Into::into))
            } else {
                quote!(::std::result::Result::Ok(#call))
            };
            let ctor = if inject {
                quote!(::inject_rs::Constructor::<Self>::injected)
            } else {
                quote!(::inject_rs::Constructor::<Self>::new)
            };
            constructors.push(quote! {
                #ctor(|#cursor| #body) #(.param(#params))*
            });
        }
    }

    Ok(quote! {
        #item

        impl #impl_generics ::inject_rs::InjectConstructors for #self_ty #where_clause {
            fn constructors() -> ::std::vec::Vec<::inject_rs::Constructor<Self>> {
                ::std::vec![#(#constructors),*]
            }
        }

        impl #impl_generics ::inject_rs::InjectMethods for #self_ty #where_clause {
            fn methods() -> ::std::vec::Vec<::inject_rs::Member<Self>> {
                ::std::vec![#(#methods),*]
            }
        }
    })
}

/// Produced type and closure body for a provider method returning `output`.
fn provider_body(output: &ReturnType, call: TokenStream2) -> (TokenStream2, TokenStream2) {
    let ty = match output {
        ReturnType::Default => {
            return (
                quote!(()),
                quote!({
                    #call;
                    ::std::result::Result::Ok(::std::sync::Arc::new(()))
                }),
            );
        }
        ReturnType::Type(_, ty) => &**ty,
    };
    if let Some(ok) = inner_type(ty, "Result") {
        return match inner_type(ok, "Arc") {
            Some(shared) => (
                quote!(#shared),
                quote!(#call.map_err(::std::convert::Into::into)),
            ),
            None => (
                quote!(#ok),
                quote!(#call
                    .map(::std::sync::Arc::new)
                    .map_err(::std::convert::Into::into)),
            ),
        };
    }
    match inner_type(ty, "Arc") {
        Some(shared) => (quote!(#shared), quote!(::std::result::Result::Ok(#call))),
        None => (
            quote!(#ty),
            quote!(::std::result::Result::Ok(::std::sync::Arc::new(#call))),
        ),
    }
}

/// Implements `Module` for the impl block's type.
///
/// An inherent `fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError>`
/// declares bindings. Each `#[provides]` method becomes a provider bound to the produced type,
/// optionally `#[named("..")]`, `#[qualified(Marker)]` and `#[singleton]`; its parameters
/// are resolved from the container unless explicit arguments are given.
#[proc_macro_attribute]
pub fn module(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(Span::call_site(), "#[module] takes no arguments")
            .into_compile_error()
            .into();
    }
    let item = parse_macro_input!(input as ItemImpl);
    expand_module(item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_module(mut item: ItemImpl) -> syn::Result<TokenStream2> {
    let self_ty = item.self_ty.clone();
    let generics = item.generics.clone();
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    let mut has_configure = false;
    let mut providers = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        if method.sig.ident == "configure" {
            has_configure = true;
        }
        if !take_flag(&mut method.attrs, "provides") {
            continue;
        }
        let produced = take_annotations(&mut method.attrs)?;
        let singleton = take_flag(&mut method.attrs, "singleton");
        if method.sig.receiver().is_none() {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "#[provides] methods take &self",
            ));
        }

        let ident = method.sig.ident.clone();
        let name = ident.to_string();
        let cursor = cursor(typed_arg_count(&method.sig) > 0);
        let (params, args) = signature_params(&mut method.sig, &cursor)?;
        let (returns, body) = provider_body(&method.sig.output, quote!(this.#ident(#(#args),*)));

        let mut provider = quote! {
            ::inject_rs::Provider::<Self, #returns>::new(#name, |this, #cursor| #body)
                #(.param(#params))*
        };
        if let Some(named) = &produced.named {
            provider = quote!(#provider.named(#named));
        }
        for qualifier in &produced.qualified {
            provider = quote!(#provider.qualified::<#qualifier>());
        }
        if singleton {
            provider = quote!(#provider.singleton());
        }
        providers.push(quote! {
            ::inject_rs::ProviderBinding::new(::std::sync::Arc::clone(&self), #provider)?
        });
    }

    let configure = if has_configure {
        quote! {
            fn configure(
                &self,
                bindings: &mut ::inject_rs::Bindings<'_>,
            ) -> ::std::result::Result<(), ::inject_rs::InjectError> {
                <#self_ty>::configure(self, bindings)
            }
        }
    } else {
        quote!()
    };

    Ok(quote! {
        #item

        impl #impl_generics ::inject_rs::Module for #self_ty #where_clause {
            #configure

            fn providers(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::result::Result<
                ::std::vec::Vec<::inject_rs::ProviderBinding>,
                ::inject_rs::InjectError,
            > {
                ::std::result::Result::Ok(::std::vec![#(#providers),*])
            }
        }
    })
}
