//! Prompt templates, one set per reasoning task
//!
//! System templates are sent in order ahead of the user template. A system
//! template that renders blank is dropped.

use crate::reasoner::ReasoningTask;

/// A named template source
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub source: &'static str,
}

/// The templates that make up one request
#[derive(Debug, Clone, Copy)]
pub struct PromptSet {
    pub task: ReasoningTask,
    pub system: &'static [Template],
    pub user: Template,
}

pub const PROMPT_SETS: [PromptSet; 5] = [
    PromptSet {
        task: ReasoningTask::ScopeCheck,
        system: &[Template {
            name: "scope_check.system",
            source: SCOPE_CHECK,
        }],
        user: Template {
            name: "scope_check.user",
            source: "{{ message }}",
        },
    },
    PromptSet {
        task: ReasoningTask::Converse,
        system: &[
            Template {
                name: "converse.system",
                source: CONVERSE,
            },
            Template {
                name: "converse.context",
                source: "{% if context %}Mensagens recentes da conversa:{{ context }}{% endif %}",
            },
        ],
        user: Template {
            name: "converse.user",
            source: "{{ message }}",
        },
    },
    PromptSet {
        task: ReasoningTask::EntityLookup,
        system: &[
            Template {
                name: "entity_lookup.system",
                source: ENTITY_LOOKUP,
            },
            Template {
                name: "entity_lookup.column",
                source: "Use a coluna {{ column }} para buscar o nome.",
            },
        ],
        user: Template {
            name: "entity_lookup.user",
            source: "{{ summary }}",
        },
    },
    PromptSet {
        task: ReasoningTask::FinalQuery,
        system: &[
            Template {
                name: "final_query.system",
                source: FINAL_QUERY,
            },
            Template {
                name: "final_query.entity",
                source: "O {{ id_column }}: {{ entity_id }}",
            },
        ],
        user: Template {
            name: "final_query.user",
            source: "{{ summary }}",
        },
    },
    PromptSet {
        task: ReasoningTask::FormatAnswer,
        system: &[
            Template {
                name: "format_answer.system",
                source: FORMAT_ANSWER,
            },
            Template {
                name: "format_answer.rows",
                source: "Resultados: {{ rows | json }}",
            },
        ],
        user: Template {
            name: "format_answer.user",
            source: "{{ summary }}",
        },
    },
];

const SCOPE_CHECK: &str = r#"Você é parte do fluxo de um chatbot. Sua única função é verificar se a mensagem do usuário
pertence ao escopo de atuação.

O escopo é um sistema de consulta de votos: o usuário pergunta qual foi a quantidade de votos
de algum candidato político.

REGRAS
- Qualquer tema alheio ao escopo (saudações, futebol, culinária, conversa fiada) é inválido.
- Perguntas incompletas, como apenas um nome próprio ou algo que pareça continuar uma conversa
  anterior à qual você não tem acesso, são válidas.

Responda somente com o JSON {"isValidInput": <true|false>}."#;

const CONVERSE: &str = r#"Você é o chatbot de um sistema de consulta de votos. O usuário quer saber a quantidade de votos
de algum político sob determinadas circunstâncias, como bairro, top 5 e afins.

Analise as mensagens recentes e a última mensagem do usuário e responda com um JSON com os campos:
- needFurtherClarification: boolean
- clarificationQuestion: string
- summary: string
- notes: string

REGRAS
- summary: descrição em linguagem natural do que deve ser buscado, usada por outro modelo para
  gerar a consulta SQL. Deixe vazio quando precisar de esclarecimento.
- needFurtherClarification: sempre preenchido. Para buscar é preciso o nome do político, uma cidade
  de referência e o critério da busca.
- Dois ou mais nomes ("Hélio Junior", "Sandra Santana") são suficientes. Apenas um nome simples
  ("Hélio", "Sandra") exige esclarecimento.
- clarificationQuestion: preenchido somente quando needFurtherClarification for true; pergunte de
  forma objetiva apenas o que falta.
- notes: registre brevemente o seu raciocínio.

Não escreva a consulta SQL."#;

const ENTITY_LOOKUP: &str = r#"Você receberá uma frase com o nome de um político e uma cidade de referência.
Sua única função é devolver a consulta abaixo substituindo os marcadores de acordo com a frase.
Escreva o nome e a cidade em caixa alta.

CONSULTA
SELECT {{ id_column }} FROM candidate WHERE <coluna> LIKE '%<nome>%' AND nm_ue = '<cidade>'

A coluna pode ser {{ alias_column }} ou {{ formal_name_column }}.

Responda no formato {"getEntityIdQuery": "<consulta>"}."#;

const FINAL_QUERY: &str = r#"Você é parte de um sistema de consulta de quantidade de votos de políticos.
Gere uma consulta SQL (SQLite) para a pergunta do usuário. Você receberá o id do político citado;
use o id no lugar do nome.

ESQUEMA
TABLE votes_by_bairro (
  id INTEGER PRIMARY KEY,
  {{ id_column }} TEXT,
  bairro TEXT,
  localidade TEXT,
  total_votos INTEGER
)

Cada linha traz o político ({{ id_column }}), o bairro, o município (localidade) e o total de votos
naquele bairro.

REGRAS
- Sempre use LIMIT; sem indicação do usuário, use 10.
- Bairros e localidades estão em MAIÚSCULAS.
- Use SUM(total_votos) com GROUP BY {{ id_column }} para o total geral.
- Use ORDER BY total_votos DESC para rankings.
- Apenas uma instrução SELECT, sem markdown.

EXEMPLO
Pergunta: "Quais foram os 5 bairros onde a Marinalda teve mais votos em São Paulo?"
Id: 250001881792
SELECT bairro, total_votos FROM votes_by_bairro WHERE {{ id_column }} = '250001881792' AND localidade = 'SÃO PAULO' ORDER BY total_votos DESC LIMIT 5

Responda no formato {"finalQuery": "<consulta>"}."#;

const FORMAT_ANSWER: &str = r#"Você apenas formata a resposta final. Você receberá a pergunta feita e os resultados de uma
consulta SQL. Escreva uma resposta objetiva e coerente, em markdown. Caso não haja resultado,
informe educadamente.

Responda no formato {"finalResult": "<resposta>"}."#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_task_has_one_set() {
        let tasks: HashSet<_> = PROMPT_SETS.iter().map(|s| s.task).collect();
        assert_eq!(tasks.len(), ReasoningTask::ALL.len());
        for task in ReasoningTask::ALL {
            assert!(tasks.contains(&task), "missing prompts for {}", task);
        }
    }

    #[test]
    fn test_template_names_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for set in PROMPT_SETS {
            for template in set.system.iter().chain(std::iter::once(&set.user)) {
                assert!(template.name.starts_with(set.task.name()));
                assert!(seen.insert(template.name), "duplicate {}", template.name);
            }
        }
    }
}
