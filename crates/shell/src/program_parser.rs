use anyhow::{anyhow, bail, Context, Result};
use types::{Instruction, Value};

/// Parse a user program from `screen -c`: instructions separated by `;`,
/// arguments separated by whitespace. Arguments are bareword symbols,
/// `0xNNNN` raw addresses, or decimal 16-bit literals. Bad arity or
/// out-of-range literals are rejected here and never reach the core.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>> {
    let mut program = Vec::new();
    for (index, statement) in source.split(';').enumerate() {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        let instruction = parse_statement(statement)
            .with_context(|| format!("instruction {} (`{statement}`)", index + 1))?;
        program.push(instruction);
    }
    if program.is_empty() {
        bail!("program has no instructions");
    }
    Ok(program)
}

fn parse_statement(statement: &str) -> Result<Instruction> {
    let mut parts = statement.split_whitespace();
    let Some(mnemonic) = parts.next() else {
        bail!("empty instruction");
    };
    let mnemonic = mnemonic.to_ascii_uppercase();
    let args: Vec<&str> = parts.collect();

    match mnemonic.as_str() {
        "PRINT" => {
            let args = args
                .iter()
                .map(|a| parse_value(a))
                .collect::<Result<Vec<Value>>>()?;
            Ok(Instruction::Print(args))
        }
        "DECLARE" => {
            let [var, value] = args.as_slice() else {
                bail!("DECLARE takes a variable and a value");
            };
            Ok(Instruction::Declare {
                var: parse_symbol(var)?,
                value: parse_value(value)?,
            })
        }
        "ADD" | "SUBTRACT" => {
            let [dest, lhs, rhs] = args.as_slice() else {
                bail!("{mnemonic} takes a destination and two operands");
            };
            let dest = parse_symbol(dest)?;
            let lhs = parse_value(lhs)?;
            let rhs = parse_value(rhs)?;
            Ok(if mnemonic == "ADD" {
                Instruction::Add { dest, lhs, rhs }
            } else {
                Instruction::Subtract { dest, lhs, rhs }
            })
        }
        "READ" => {
            let [var, addr] = args.as_slice() else {
                bail!("READ takes a variable and an address");
            };
            Ok(Instruction::Read {
                var: parse_symbol(var)?,
                addr: parse_address(addr)?,
            })
        }
        "WRITE" => {
            let [addr, value] = args.as_slice() else {
                bail!("WRITE takes an address and a value");
            };
            Ok(Instruction::Write {
                addr: parse_address(addr)?,
                value: parse_value(value)?,
            })
        }
        other => bail!("unknown mnemonic `{other}`"),
    }
}

fn parse_value(token: &str) -> Result<Value> {
    if token.starts_with("0x") || token.starts_with("0X") {
        return Ok(Value::Address(parse_address(token)?));
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        let value: u16 = token
            .parse()
            .map_err(|_| anyhow!("literal `{token}` exceeds 65535"))?;
        return Ok(Value::Literal(value));
    }
    Ok(Value::Symbol(parse_symbol(token)?))
}

fn parse_symbol(token: &str) -> Result<String> {
    let starts_ok = token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("`{token}` is not a valid variable name");
    }
    Ok(token.to_string())
}

fn parse_address(token: &str) -> Result<i32> {
    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("address `{token}` must be hex like 0x1000"))?;
    i32::from_str_radix(hex, 16).map_err(|_| anyhow!("bad address `{token}`"))
}
