//! The standard story macros.

use super::{scan_block, BlockDelimiters, Macro, MacroCall, MacroError, MacroInit, MacroRegistry};
use crate::expr;
use crate::node::{Element, Link, Node, Tag};
use crate::value::Value;
use crate::wikifier::formatters::internal_link;
use crate::wikifier::Wikifier;
use std::time::SystemTime;

const IF_BLOCK: BlockDelimiters = BlockDelimiters {
    open: "<<if ",
    split: Some("<<else>>"),
    close: "<<endif>>",
};

const SILENTLY_BLOCK: BlockDelimiters = BlockDelimiters {
    open: "<<silently>>",
    split: None,
    close: "<<endsilently>>",
};

pub(crate) fn register_all(registry: &mut MacroRegistry) {
    registry.register("if", If);
    registry.register("else", Sentinel);
    registry.register("endif", Sentinel);
    registry.register("set", Set);
    registry.register("print", Print);
    registry.register("remember", Remember);
    registry.register("back", Back);
    registry.register("actions", Actions);
    registry.register("display", Display);
    registry.register("silently", Silently);
    registry.register("endsilently", Sentinel);
    registry.register("choice", Choice);
}

fn first_param<'c>(call: &'c MacroCall<'_>) -> Result<&'c str, MacroError> {
    call.params
        .first()
        .map(String::as_str)
        .ok_or_else(|| MacroError::MissingParameter {
            macro_name: call.name.to_string(),
        })
}

/// `<<else>>`, `<<endif>>`, `<<endsilently>>`: only meaningful to the
/// block scan of their opener.
pub struct Sentinel;

impl Macro for Sentinel {
    fn handle(&self, _: &mut Vec<Node>, _: &MacroCall<'_>, _: &mut Wikifier<'_, '_>) -> Result<(), MacroError> {
        Ok(())
    }
}

/// `<<if cond>>..<<else>>..<<endif>>`
pub struct If;

impl Macro for If {
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        let block = scan_block(w.source(), w.next_match, &IF_BLOCK)
            .ok_or(MacroError::MissingEnd { end: "endif" })?;
        w.next_match = block.end;

        let variables = &mut w.ctx.history.current_mut().variables;
        let condition = expr::evaluate(call.args, variables).map_err(MacroError::BadCondition)?;

        let branch = if condition.is_truthy() {
            block.body
        } else {
            block.alternate.unwrap_or("")
        };
        w.ctx.render_into(out, branch.trim())
    }
}

/// `<<set $x = expr>>`
pub struct Set;

impl Macro for Set {
    fn handle(&self, _: &mut Vec<Node>, call: &MacroCall<'_>, w: &mut Wikifier<'_, '_>) -> Result<(), MacroError> {
        let variables = &mut w.ctx.history.current_mut().variables;
        expr::evaluate(call.args, variables).map_err(MacroError::BadExpression)?;
        Ok(())
    }
}

/// `<<print expr>>`: the value's text is rendered as wikitext. Undefined
/// and empty values print nothing.
pub struct Print;

impl Macro for Print {
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        let variables = &mut w.ctx.history.current_mut().variables;
        let value = expr::evaluate(call.args, variables).map_err(MacroError::BadExpression)?;

        match value {
            Value::Undefined => Ok(()),
            Value::Str(ref s) if s.is_empty() => Ok(()),
            other => w.ctx.render_into(out, &other.to_string()),
        }
    }
}

/// `<<remember $x = expr>>`: `set`, then persist the variable so later
/// sessions start with it.
pub struct Remember;

impl Macro for Remember {
    fn handle(&self, _: &mut Vec<Node>, call: &MacroCall<'_>, w: &mut Wikifier<'_, '_>) -> Result<(), MacroError> {
        let variables = &mut w.ctx.history.current_mut().variables;
        expr::evaluate(call.args, variables).map_err(MacroError::BadExpression)?;

        let name = expr::first_variable(call.args).ok_or_else(|| MacroError::NothingToRemember {
            statement: call.args.to_string(),
        })?;
        let value = variables.get(name);
        let encoded = expr::literal(&value).ok_or_else(|| MacroError::CannotRemember {
            name: name.to_string(),
            kind: value.kind(),
        })?;

        let key = format!("{}{}", w.ctx.persist_prefix, name);
        let expires = SystemTime::now() + w.ctx.config.remember_ttl;
        tracing::debug!(key = %key, value = %encoded, "remembering");
        w.ctx.persistence.set(&key, &encoded, expires);
        Ok(())
    }

    /// Replay every remembered `name=value` under the story's prefix into
    /// the starting variables.
    fn init(&self, init: &mut MacroInit<'_>) -> Result<(), MacroError> {
        for (key, value) in init.persistence.get_all(init.persist_prefix) {
            let Some(name) = key.strip_prefix(init.persist_prefix) else {
                continue;
            };
            let statement = format!("${name}={value}");
            if let Err(e) = expr::evaluate(&statement, &mut *init.variables) {
                tracing::warn!(key = %key, error = %e, "skipping unreadable remembered value");
            }
        }
        Ok(())
    }
}

/// `<<back>>` or `<<back "Title">>`: a link to an earlier point in history.
pub struct Back;

impl Macro for Back {
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        let history = &*w.ctx.history;

        let token = match call.params.first() {
            Some(title) => history
                .iter()
                .skip(1)
                .find(|entry| entry.title() == Some(title.as_str()))
                .map(|entry| entry.token.clone())
                .ok_or_else(|| MacroError::NotInHistory {
                    title: title.clone(),
                })?,
            None => match history.get(1) {
                Some(entry) if entry.title().is_some() => entry.token.clone(),
                _ => return Err(MacroError::NoHistory),
            },
        };

        let link = Element::link(Link::Back { token })
            .with_child(Element::new(Tag::Strong).with_text("\u{ab}"))
            .with_text(" Back");
        out.push(link.into());
        Ok(())
    }
}

/// `<<actions "A" "B">>`: one-shot links. A followed action stays hidden
/// for the rest of the entry's life.
pub struct Actions;

impl Macro for Actions {
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        let mut list = Element::new(Tag::UnorderedList);

        for title in &call.params {
            if w.ctx.history.current().variables.action_clicked(title) {
                continue;
            }

            let link = Element::link(Link::Action {
                title: title.clone(),
                broken: !w.ctx.store.has(title),
            })
            .with_text(title.as_str());
            list.children.push(Element::new(Tag::ListItem).with_child(link).into());
            w.ctx.offered_actions.push(title.clone());
        }

        out.push(list.into());
        Ok(())
    }
}

/// `<<display "Title">>`: render another passage in place.
pub struct Display;

impl Macro for Display {
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        let title = first_param(call)?;
        let text = w.ctx.store.get(title).text().to_string();

        tracing::debug!(title, "displaying inline");
        w.ctx.render_into(out, &text)
    }
}

/// `<<silently>>..<<endsilently>>`: run the enclosed macros, show nothing.
pub struct Silently;

impl Macro for Silently {
    fn handle(&self, _: &mut Vec<Node>, _: &MacroCall<'_>, w: &mut Wikifier<'_, '_>) -> Result<(), MacroError> {
        let block = scan_block(w.source(), w.next_match, &SILENTLY_BLOCK)
            .ok_or(MacroError::MissingEnd { end: "endsilently" })?;
        w.next_match = block.end;

        let mut discarded = Vec::new();
        w.ctx.render_into(&mut discarded, block.body)
    }
}

/// `<<choice "Title">>`: a plain passage link.
pub struct Choice;

impl Macro for Choice {
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        let title = first_param(call)?;
        out.push(internal_link(w.ctx.store, title).with_text(title).into());
        Ok(())
    }
}
