//! Template engine that turns step inputs into reasoner requests

use super::errors::PromptError;
use super::filters;
use super::templates::{PROMPT_SETS, Template};
use crate::reasoner::{ReasonerRequest, ReasoningTask};
use minijinja::{Environment, UndefinedBehavior, Value};

/// Renders the prompt set of a task
///
/// Every template is compiled when the engine is built, so a broken template
/// fails at startup rather than mid-conversation. Undefined variables are
/// errors, never empty strings.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self, PromptError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        filters::register_filters(&mut env);

        if let Some(task) = ReasoningTask::ALL
            .into_iter()
            .find(|task| !PROMPT_SETS.iter().any(|set| set.task == *task))
        {
            return Err(PromptError::UnknownTask(task));
        }

        for set in PROMPT_SETS.iter() {
            for template in set.system.iter().chain(std::iter::once(&set.user)) {
                env.add_template(template.name, template.source)
                    .map_err(|e| PromptError::from_minijinja(template.name, e, &[]))?;
            }
        }

        Ok(Self { env })
    }

    /// Build the request for `task` from the given context
    ///
    /// ```ignore
    /// let request = engine.render(
    ///     ReasoningTask::Converse,
    ///     &context! { message => "Quantos votos teve Hélio Junior?", context => "" },
    /// )?;
    /// ```
    pub fn render(&self, task: ReasoningTask, ctx: &Value) -> Result<ReasonerRequest, PromptError> {
        let set = PROMPT_SETS
            .iter()
            .find(|set| set.task == task)
            .ok_or(PromptError::UnknownTask(task))?;
        let known = known_variables(ctx);

        let mut request = ReasonerRequest::new(task, self.render_one(&set.user, ctx, &known)?);
        for template in set.system {
            request = request.with_system(self.render_one(template, ctx, &known)?);
        }

        tracing::trace!(
            task = %task,
            system_messages = request.system.len(),
            prompt_len = request.prompt.len(),
            "Rendered prompt"
        );
        Ok(request)
    }

    fn render_one(
        &self,
        template: &Template,
        ctx: &Value,
        known: &[String],
    ) -> Result<String, PromptError> {
        let compiled = self
            .env
            .get_template(template.name)
            .map_err(|e| PromptError::from_minijinja(template.name, e, known))?;

        compiled
            .render(ctx)
            .map(|s| s.trim().to_string())
            .map_err(|e| PromptError::from_minijinja(template.name, e, known))
    }
}

fn known_variables(ctx: &Value) -> Vec<String> {
    ctx.try_iter()
        .map(|keys| {
            keys.filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    fn engine() -> PromptEngine {
        PromptEngine::new().unwrap()
    }

    #[test]
    fn test_all_templates_compile() {
        let engine = engine();
        for set in PROMPT_SETS.iter() {
            assert!(engine.env.get_template(set.user.name).is_ok());
        }
    }

    #[test]
    fn test_scope_check_request() {
        let request = engine()
            .render(
                ReasoningTask::ScopeCheck,
                &context! { message => "Qual a previsão do tempo?" },
            )
            .unwrap();

        assert_eq!(request.task, ReasoningTask::ScopeCheck);
        assert_eq!(request.prompt, "Qual a previsão do tempo?");
        assert_eq!(request.system.len(), 1);
        assert!(request.system[0].contains("isValidInput"));
    }

    #[test]
    fn test_converse_skips_empty_context() {
        let engine = engine();

        let fresh = engine
            .render(
                ReasoningTask::Converse,
                &context! { message => "Hélio", context => "" },
            )
            .unwrap();
        assert_eq!(fresh.system.len(), 1);

        let ongoing = engine
            .render(
                ReasoningTask::Converse,
                &context! { message => "Campinas", context => "\nHuman:Hélio\nSystem:Em qual cidade?" },
            )
            .unwrap();
        assert_eq!(ongoing.system.len(), 2);
        assert!(ongoing.system[1].contains("Human:Hélio"));
    }

    #[test]
    fn test_entity_lookup_names_columns() {
        let request = engine()
            .render(
                ReasoningTask::EntityLookup,
                &context! {
                    summary => "votos de Hélio Junior em Campinas",
                    column => "nm_votavel",
                    id_column => "sq_candidato",
                    alias_column => "nm_votavel",
                    formal_name_column => "nm_candidato",
                },
            )
            .unwrap();

        assert!(request.system[0].contains("SELECT sq_candidato FROM candidate"));
        assert!(request.system[1].contains("nm_votavel"));
        assert_eq!(request.prompt, "votos de Hélio Junior em Campinas");
    }

    #[test]
    fn test_format_answer_embeds_rows_as_json() {
        let rows = serde_json::json!([{"bairro": "CENTRO", "total_votos": 812}]);
        let request = engine()
            .render(
                ReasoningTask::FormatAnswer,
                &context! { summary => "top bairros", rows => rows },
            )
            .unwrap();

        assert!(request.system[1].contains(r#""total_votos":812"#));
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let result = engine().render(
            ReasoningTask::FinalQuery,
            &context! { sumary => "x", id_column => "sq_candidato", entity_id => "1" },
        );

        match result {
            Err(PromptError::UndefinedVariable { template, .. }) => {
                assert!(template.starts_with("final_query"));
            }
            other => panic!("expected undefined variable, got {:?}", other),
        }
    }
}
