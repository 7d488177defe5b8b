//! Built-in function table, indexed by `iftab`.

/// `iftab` of user-defined and add-in functions; the function name is the first argument.
pub(crate) const USER_DEFINED: u16 = 255;

/// Names for `iftab` values `0..=379`. Empty strings are unused ids.
const NAMES: [&str; 380] = [
    "COUNT", "IF", "ISNA", "ISERROR", "SUM", "AVERAGE", "MIN", "MAX", "ROW", "COLUMN", "NA", "NPV",
    "STDEV", "DOLLAR", "FIXED", "SIN", "COS", "TAN", "ATAN", "PI", "SQRT", "EXP", "LN", "LOG10",
    "ABS", "INT", "SIGN", "ROUND", "LOOKUP", "INDEX", "REPT", "MID", "LEN", "VALUE", "TRUE",
    "FALSE", "AND", "OR", "NOT", "MOD", "DCOUNT", "DSUM", "DAVERAGE", "DMIN", "DMAX", "DSTDEV",
    "VAR", "DVAR", "TEXT", "LINEST", "TREND", "LOGEST", "GROWTH", "GOTO", "HALT", "RETURN", "PV",
    "FV", "NPER", "PMT", "RATE", "MIRR", "IRR", "RAND", "MATCH", "DATE", "TIME", "DAY", "MONTH",
    "YEAR", "WEEKDAY", "HOUR", "MINUTE", "SECOND", "NOW", "AREAS", "ROWS", "COLUMNS", "OFFSET",
    "ABSREF", "RELREF", "ARGUMENT", "SEARCH", "TRANSPOSE", "ERROR", "STEP", "TYPE", "ECHO",
    "SET.NAME", "CALLER", "DEREF", "WINDOWS", "SERIES", "DOCUMENTS", "ACTIVE.CELL", "SELECTION",
    "RESULT", "ATAN2", "ASIN", "ACOS", "CHOOSE", "HLOOKUP", "VLOOKUP", "LINKS", "INPUT", "ISREF",
    "GET.FORMULA", "GET.NAME", "SET.VALUE", "LOG", "EXEC", "CHAR", "LOWER", "UPPER", "PROPER",
    "LEFT", "RIGHT", "EXACT", "TRIM", "REPLACE", "SUBSTITUTE", "CODE", "NAMES", "DIRECTORY",
    "FIND", "CELL", "ISERR", "ISTEXT", "ISNUMBER", "ISBLANK", "T", "N", "FOPEN", "FCLOSE", "FSIZE",
    "FREADLN", "FREAD", "FWRITELN", "FWRITE", "FPOS", "DATEVALUE", "TIMEVALUE", "SLN", "SYD",
    "DDB", "GET.DEF", "REFTEXT", "TEXTREF", "INDIRECT", "REGISTER", "CALL", "ADD.BAR", "ADD.MENU",
    "ADD.COMMAND", "ENABLE.COMMAND", "CHECK.COMMAND", "RENAME.COMMAND", "SHOW.BAR", "DELETE.MENU",
    "DELETE.COMMAND", "GET.CHART.ITEM", "DIALOG.BOX", "CLEAN", "MDETERM", "MINVERSE", "MMULT",
    "FILES", "IPMT", "PPMT", "COUNTA", "CANCEL.KEY", "FOR", "WHILE", "BREAK", "NEXT", "INITIATE",
    "REQUEST", "POKE", "EXECUTE", "TERMINATE", "RESTART", "HELP", "GET.BAR", "PRODUCT", "FACT",
    "GET.CELL", "GET.WORKSPACE", "GET.WINDOW", "GET.DOCUMENT", "DPRODUCT", "ISNONTEXT", "GET.NOTE",
    "NOTE", "STDEVP", "VARP", "DSTDEVP", "DVARP", "TRUNC", "ISLOGICAL", "DCOUNTA", "DELETE.BAR",
    "UNREGISTER", "", "", "USDOLLAR", "FINDB", "SEARCHB", "REPLACEB", "LEFTB", "RIGHTB", "MIDB",
    "LENB", "ROUNDUP", "ROUNDDOWN", "ASC", "DBCS", "RANK", "", "", "ADDRESS", "DAYS360", "TODAY",
    "VDB", "ELSE", "ELSE.IF", "END.IF", "FOR.CELL", "MEDIAN", "SUMPRODUCT", "SINH", "COSH", "TANH",
    "ASINH", "ACOSH", "ATANH", "DGET", "CREATE.OBJECT", "VOLATILE", "LAST.ERROR", "CUSTOM.UNDO",
    "CUSTOM.REPEAT", "FORMULA.CONVERT", "GET.LINK.INFO", "TEXT.BOX", "INFO", "GROUP", "GET.OBJECT",
    "DB", "PAUSE", "", "", "RESUME", "FREQUENCY", "ADD.TOOLBAR", "DELETE.TOOLBAR", "USER",
    "RESET.TOOLBAR", "EVALUATE", "GET.TOOLBAR", "GET.TOOL", "SPELLING.CHECK", "ERROR.TYPE",
    "APP.TITLE", "WINDOW.TITLE", "SAVE.TOOLBAR", "ENABLE.TOOL", "PRESS.TOOL", "REGISTER.ID",
    "GET.WORKBOOK", "AVEDEV", "BETADIST", "GAMMALN", "BETAINV", "BINOMDIST", "CHIDIST", "CHIINV",
    "COMBIN", "CONFIDENCE", "CRITBINOM", "EVEN", "EXPONDIST", "FDIST", "FINV", "FISHER",
    "FISHERINV", "FLOOR", "GAMMADIST", "GAMMAINV", "CEILING", "HYPGEOMDIST", "LOGNORMDIST",
    "LOGINV", "NEGBINOMDIST", "NORMDIST", "NORMSDIST", "NORMINV", "NORMSINV", "STANDARDIZE", "ODD",
    "PERMUT", "POISSON", "TDIST", "WEIBULL", "SUMXMY2", "SUMX2MY2", "SUMX2PY2", "CHITEST",
    "CORREL", "COVAR", "FORECAST", "FTEST", "INTERCEPT", "PEARSON", "RSQ", "STEYX", "SLOPE",
    "TTEST", "PROB", "DEVSQ", "GEOMEAN", "HARMEAN", "SUMSQ", "KURT", "SKEW", "ZTEST", "LARGE",
    "SMALL", "QUARTILE", "PERCENTILE", "PERCENTRANK", "MODE", "TRIMMEAN", "TINV", "",
    "MOVIE.COMMAND", "GET.MOVIE", "CONCATENATE", "POWER", "PIVOT.ADD.DATA", "GET.PIVOT.TABLE",
    "GET.PIVOT.FIELD", "GET.PIVOT.ITEM", "RADIANS", "DEGREES", "SUBTOTAL", "SUMIF", "COUNTIF",
    "COUNTBLANK", "SCENARIO.GET", "OPTIONS.LISTS.GET", "ISPMT", "DATEDIF", "DATESTRING",
    "NUMBERSTRING", "ROMAN", "OPEN.DIALOG", "SAVE.DIALOG", "VIEW.GET", "GETPIVOTDATA", "HYPERLINK",
    "PHONETIC", "AVERAGEA", "MAXA", "MINA", "STDEVPA", "VARPA", "STDEVA", "VARA", "BAHTTEXT",
    "THAIDAYOFWEEK", "THAIDIGIT", "THAIMONTHOFYEAR", "THAINUMSOUND", "THAINUMSTRING",
    "THAISTRINGLENGTH", "ISTHAIDIGIT", "ROUNDBAHTDOWN", "ROUNDBAHTUP", "THAIYEAR", "RTD",
];

pub(crate) fn function_name(iftab: u16) -> Option<&'static str> {
    NAMES
        .get(iftab as usize)
        .copied()
        .filter(|name| !name.is_empty())
}

/// Argument count of functions encoded with `PtgFunc`, which carries no count of its own.
pub(crate) fn fixed_arg_count(iftab: u16) -> Option<usize> {
    let count = match iftab {
        10 | 19 | 34 | 35 | 63 | 74 => 0,
        2 | 3 | 15 | 16 | 17 | 18 | 20 | 21 | 22 | 23 | 24 | 25 | 26 | 32 | 33 | 38 | 67 | 68 |
        69 | 71 | 72 | 73 | 75 | 76 | 77 | 83 | 86 | 98 | 99 | 105 | 111 | 112 | 113 | 114 | 118 |
        121 | 126 | 127 | 128 | 129 | 130 | 131 | 140 | 141 | 162 | 163 | 164 | 184 | 190 | 198 |
        211 | 214 | 215 | 229 | 230 | 231 | 232 | 233 | 234 | 244 | 261 | 271 | 279 | 283 | 284 |
        294 | 296 | 298 | 342 | 343 | 347 | 352 | 360 | 368 => 1,
        27 | 30 | 39 | 48 | 79 | 97 | 117 | 165 | 212 | 213 | 252 | 274 | 275 | 276 | 285 | 288 |
        299 | 303 | 304 | 305 | 306 | 307 | 308 | 310 | 311 | 312 | 313 | 314 | 315 | 325 | 326 |
        327 | 328 | 331 | 332 | 337 | 346 | 353 => 2,
        31 | 40 | 41 | 42 | 43 | 44 | 45 | 47 | 61 | 65 | 66 | 142 | 189 | 195 | 196 | 199 | 210 |
        235 | 277 | 278 | 280 | 281 | 282 | 287 | 290 | 291 | 292 | 295 | 297 | 300 | 301 | 309 |
        351 => 3,
        119 | 143 | 207 | 273 | 286 | 289 | 293 | 302 | 316 | 350 => 4,
        _ => return None,
    };
    Some(count)
}
